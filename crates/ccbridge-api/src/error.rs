//! API error type and its mapping onto OpenAI-style error payloads.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use ccbridge_core::{EngineError, PromptError, SessionError};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or conflicting input; the engine is never invoked.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or mismatched API key.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Unknown session or model.
    #[error("not found: {0}")]
    NotFound(String),

    /// Engine-side fault, already classified by the port.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<PromptError> for ApiError {
    fn from(err: PromptError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self::NotFound(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::InvalidRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(message.clone(), "invalid_request_error"),
            ),
            Self::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new(message.clone(), "authentication_error"),
            ),
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(message.clone(), "not_found_error"),
            ),
            Self::Engine(engine) => (
                StatusCode::from_u16(engine.suggested_status_code())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                ErrorResponse::with_code(engine.to_string(), "api_error", engine.error_type()),
            ),
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn engine_timeouts_map_to_gateway_timeout() {
        let response = ApiError::Engine(EngineError::Timeout(Duration::from_secs(1)))
            .into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn unauthorized_carries_the_challenge_header() {
        let response = ApiError::Unauthorized("missing API key".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}
