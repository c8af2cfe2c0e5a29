//! Command-line arguments.
//!
//! Every flag has an environment fallback so the server can run equally from
//! a shell, a unit file, or a `.env` file loaded at startup.

use std::path::PathBuf;

use clap::Parser;

/// OpenAI-compatible API server over the Claude Code CLI.
#[derive(Debug, Parser)]
#[command(name = "ccbridge", version, about)]
pub struct Cli {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Path to the engine binary; defaults to `claude` on PATH.
    #[arg(long, env = "CLAUDE_CLI_PATH")]
    pub engine_bin: Option<PathBuf>,

    /// Working directory for engine invocations.
    #[arg(long, env = "CLAUDE_CWD")]
    pub cwd: Option<PathBuf>,

    /// Per-request engine deadline in milliseconds.
    #[arg(long, env = "MAX_TIMEOUT", default_value_t = 600_000)]
    pub timeout_ms: u64,

    /// Static bearer key; unset disables request authentication.
    #[arg(long, env = "API_KEY")]
    pub api_key: Option<String>,

    /// Comma-separated allowed CORS origins; unset or `*` allows all.
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Idle session time-to-live in seconds.
    #[arg(long, env = "SESSION_TTL_SECS", default_value_t = 3600)]
    pub session_ttl_secs: u64,

    /// Interval between session sweeps in seconds.
    #[arg(long, env = "SESSION_SWEEP_SECS", default_value_t = 300)]
    pub sweep_interval_secs: u64,

    /// Skip the engine verification probe at startup.
    #[arg(long)]
    pub skip_probe: bool,
}
