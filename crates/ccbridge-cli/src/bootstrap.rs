//! Composition root.
//!
//! This is the ONLY place where infrastructure is wired together: the engine
//! adapter, the session store and its sweeper, the HTTP state, and the
//! server lifecycle. Everything else receives its dependencies.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ccbridge_api::{ApiConfig, ApiContext, AppState, CorsConfig, serve};
use ccbridge_core::{SessionConfig, SessionStore};
use ccbridge_engine::{ClaudeEngine, EngineConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::args::Cli;

/// Wire everything and run until shutdown.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let request_timeout = Duration::from_millis(cli.timeout_ms);

    let engine = ClaudeEngine::new(EngineConfig {
        binary: cli.engine_bin.clone(),
        cwd: cli.cwd.clone(),
        default_timeout: request_timeout,
    });

    if cli.skip_probe {
        warn!("engine verification skipped (--skip-probe)");
    } else {
        let version = engine
            .verify()
            .await
            .context("engine verification failed")?;
        info!(%version, "engine verified");
    }

    let auth = engine.auth().status();
    info!(method = ?auth.method, ready = auth.ready, "engine authentication resolved");
    for warning in &auth.warnings {
        warn!("{warning}");
    }

    let sessions = Arc::new(SessionStore::new(
        SessionConfig::default()
            .with_ttl(Duration::from_secs(cli.session_ttl_secs))
            .with_sweep_interval(Duration::from_secs(cli.sweep_interval_secs)),
    ));

    let cancel = CancellationToken::new();
    let sweeper = Arc::clone(&sessions).start_sweeper(cancel.clone());

    let state: AppState = Arc::new(ApiContext {
        engine: Arc::new(engine),
        sessions: Arc::clone(&sessions),
        auth,
        config: ApiConfig {
            api_key: cli.api_key.clone(),
            request_timeout,
        },
    });

    let cors = match &cli.cors_origins {
        Some(origins) if !origins.iter().any(|o| o == "*") => {
            CorsConfig::Origins(origins.clone())
        }
        _ => CorsConfig::AllowAll,
    };

    let listener = TcpListener::bind((cli.host.as_str(), cli.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", cli.host, cli.port))?;

    info!(
        auth = if cli.api_key.is_some() { "api-key" } else { "open" },
        session_ttl_secs = cli.session_ttl_secs,
        "ccbridge ready"
    );

    // Ctrl-C flips the token; the server and the sweeper both drain on it.
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    let result = serve(listener, state, cors, cancel.clone()).await;
    cancel.cancel();
    let _ = sweeper.await;
    result
}
