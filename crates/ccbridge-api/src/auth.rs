//! Optional bearer-key request authentication.
//!
//! When no key is configured every request passes; when one is set, a
//! missing or mismatched `Authorization: Bearer` header is rejected with an
//! OpenAI-shaped 401 before the handler runs.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// Middleware enforcing the configured API key.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.api_key.as_deref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(key) if key == expected => next.run(request).await,
        Some(_) => ApiError::Unauthorized("invalid API key".into()).into_response(),
        None => ApiError::Unauthorized("missing API key".into()).into_response(),
    }
}
