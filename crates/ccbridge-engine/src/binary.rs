//! Engine binary resolution and startup verification.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ccbridge_core::EngineError;
use tokio::process::Command;
use tracing::info;

/// Name of the engine binary when nothing more specific is configured; the
/// OS resolves it through `PATH` at spawn time.
pub const DEFAULT_BINARY: &str = "claude";

/// Environment variable overriding the binary location.
pub const BINARY_ENV_VAR: &str = "CLAUDE_CLI_PATH";

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pick the engine binary: explicit configuration wins, then the
/// environment override, then the bare name resolved via `PATH`.
#[must_use]
pub fn resolve_binary(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    if let Ok(env_path) = std::env::var(BINARY_ENV_VAR)
        && !env_path.trim().is_empty()
    {
        return PathBuf::from(env_path);
    }
    PathBuf::from(DEFAULT_BINARY)
}

/// Verify the engine binary runs at all, returning its reported version.
///
/// Called once at startup so a missing or broken installation fails fast
/// with guidance instead of failing the first request.
///
/// # Errors
///
/// `EngineError::Unavailable` if the binary cannot be executed or exits
/// nonzero; `EngineError::Timeout` if it hangs.
pub async fn probe(binary: &Path) -> Result<String, EngineError> {
    let output = tokio::time::timeout(PROBE_TIMEOUT, Command::new(binary).arg("--version").output())
        .await
        .map_err(|_| EngineError::Timeout(PROBE_TIMEOUT))?
        .map_err(|e| {
            EngineError::Unavailable(format!(
                "engine binary `{}` could not be executed: {e}. Install it with `npm install -g @anthropic-ai/claude-code` and authenticate it once before starting the server",
                binary.display()
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::Unavailable(format!(
            "engine binary `{}` exited with {}: {}",
            binary.display(),
            output.status,
            stderr.trim()
        )));
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    info!(binary = %binary.display(), %version, "engine binary verified");
    Ok(version)
}
