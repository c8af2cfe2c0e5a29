//! Axum HTTP server for the OpenAI-compatible API.
//!
//! `serve()` runs the composed router on a pre-bound listener until the
//! cancellation token fires, then shuts down gracefully.

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::routes::{CorsConfig, create_router};
use crate::state::AppState;

/// Start the API server with a pre-bound listener.
///
/// # Errors
///
/// Returns an error if the listener address cannot be read or the server
/// fails while running.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cors: CorsConfig,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("API server starting on {addr}");

    let app = create_router(state, &cors);

    info!("API listening on {addr}");
    info!("Point any OpenAI client at: http://{addr}/v1");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("API server shut down");
    Ok(())
}
