//! Health, model catalog, auth status, and compatibility endpoints.

use axum::Json;
use axum::extract::State;
use ccbridge_engine::AuthStatus;
use serde::Serialize;

use crate::compat::{self, CompatibilityReport};
use crate::models::{ChatCompletionRequest, ModelsResponse};
use crate::state::AppState;

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ccbridge"
    }))
}

/// GET /v1/models
pub async fn list_models() -> Json<ModelsResponse> {
    Json(ModelsResponse::catalog())
}

/// Response from GET /v1/auth/status.
#[derive(Debug, Serialize)]
pub struct AuthStatusResponse {
    /// How the engine authenticates upstream.
    pub engine_auth: AuthStatus,
    /// Whether this server itself requires a bearer key.
    pub api_key_required: bool,
}

/// GET /v1/auth/status
pub async fn auth_status(State(state): State<AppState>) -> Json<AuthStatusResponse> {
    Json(AuthStatusResponse {
        engine_auth: state.auth.clone(),
        api_key_required: state.config.api_key.is_some(),
    })
}

/// POST /v1/compatibility
///
/// Reports which supplied parameters would be honored, without invoking the
/// engine.
pub async fn compatibility(
    Json(request): Json<ChatCompletionRequest>,
) -> Json<CompatibilityReport> {
    Json(compat::report(&request))
}
