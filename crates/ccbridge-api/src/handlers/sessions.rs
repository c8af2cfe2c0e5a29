//! Session management endpoints: synchronous views over the session store.

use axum::Json;
use axum::extract::{Path, State};
use ccbridge_core::StoreStats;
use serde::Serialize;

use crate::error::ApiError;
use crate::models::{SessionInfo, SessionListResponse};
use crate::state::AppState;

/// GET /v1/sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    let mut sessions: Vec<SessionInfo> = state
        .sessions
        .list()
        .into_iter()
        .map(SessionInfo::from)
        .collect();
    sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
    let count = sessions.len();
    Json(SessionListResponse { sessions, count })
}

/// GET /v1/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, ApiError> {
    state
        .sessions
        .get(&id)
        .map(SessionInfo::from)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("session not found: {id}")))
}

/// Body returned by a successful delete.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub session_id: String,
}

/// DELETE /v1/sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if state.sessions.delete(&id) {
        Ok(Json(DeleteResponse {
            deleted: true,
            session_id: id,
        }))
    } else {
        Err(ApiError::NotFound(format!("session not found: {id}")))
    }
}

/// GET /v1/sessions/stats
pub async fn session_stats(State(state): State<AppState>) -> Json<StoreStats> {
    Json(state.sessions.stats())
}
