//! Router assembly.

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::auth::require_api_key;
use crate::handlers::{chat, misc, sessions};
use crate::state::AppState;

/// CORS policy for the server.
#[derive(Debug, Clone)]
pub enum CorsConfig {
    /// Allow any origin (the default, matching a local developer tool).
    AllowAll,
    /// Allow only the listed origins.
    Origins(Vec<String>),
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::Origins(origins) => {
            let parsed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(%origin, "ignoring unparseable CORS origin");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parsed))
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// Build the application router.
///
/// Everything under `/v1` except the auth diagnostic sits behind the
/// optional bearer-key check; `/health` stays open for probes.
pub fn create_router(state: AppState, cors: &CorsConfig) -> Router {
    let protected = Router::new()
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/models", get(misc::list_models))
        .route("/v1/compatibility", post(misc::compatibility))
        .route("/v1/sessions", get(sessions::list_sessions))
        .route("/v1/sessions/stats", get(sessions::session_stats))
        .route(
            "/v1/sessions/{id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(misc::health))
        .route("/v1/auth/status", get(misc::auth_status))
        .merge(protected)
        .layer(cors_layer(cors))
        .with_state(state)
}
