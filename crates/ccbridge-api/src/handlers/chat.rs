//! The chat-completions handler: normalize, merge session context, invoke
//! the engine, and hand off to the streaming translator or the collector.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use ccbridge_core::{ChatMessage, EngineOptions, EngineRequest, Role, normalize};
use chrono::Utc;
use tracing::{info, warn};

use crate::collect;
use crate::compat;
use crate::error::ApiError;
use crate::models::{ChatCompletionRequest, request_id};
use crate::state::AppState;
use crate::stream::{self, CompletionContext, SessionTurn};

/// Engine option headers. Body parameters stay OpenAI-compatible; engine
/// tuning travels out-of-band.
const HDR_MAX_TURNS: &str = "x-claude-max-turns";
const HDR_ALLOWED_TOOLS: &str = "x-claude-allowed-tools";
const HDR_DISALLOWED_TOOLS: &str = "x-claude-disallowed-tools";
const HDR_PERMISSION_MODE: &str = "x-claude-permission-mode";
const HDR_MAX_THINKING_TOKENS: &str = "x-claude-max-thinking-tokens";

const PERMISSION_MODES: &[&str] = &["default", "acceptEdits", "bypassPermissions", "plan"];

/// POST /v1/chat/completions
pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    for warning in compat::validate(&request)? {
        warn!("{warning}");
    }
    let options = engine_options(&headers, &state)?;

    let new_messages = to_domain(&request)?;

    info!(
        model = %request.model,
        streaming = %request.stream,
        session = %request.session_id.as_deref().unwrap_or("-"),
        messages = new_messages.len(),
        "processing chat completion request"
    );

    // Session mode: take the session's exclusive lock for the whole request,
    // so overlapping requests on one session serialize instead of
    // interleaving, and prepend the stored context.
    let mut session: Option<SessionTurn> = None;
    let full_messages = if let Some(session_id) = &request.session_id {
        let handle = state.sessions.acquire(session_id).await;
        let mut all = handle.messages().to_vec();
        all.extend(new_messages.iter().cloned());
        let user = new_messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .cloned();
        session = Some(SessionTurn { handle, user });
        all
    } else {
        new_messages
    };

    let normalized = normalize(&full_messages)?;
    let engine_request = EngineRequest::new(normalized.prompt)
        .with_system_prompt(normalized.system_prompt)
        .with_model(Some(request.model.clone()))
        .with_options(options);

    // A failure to start maps to a single non-streaming error response,
    // regardless of the requested mode: nothing has been sent yet.
    let events = state.engine.invoke(engine_request).await?;

    let ctx = CompletionContext {
        request_id: request_id(),
        created: Utc::now().timestamp(),
        model: request.model,
        session,
    };

    if request.stream {
        Ok(stream::sse_response(events, ctx))
    } else {
        collect::json_response(events, ctx).await
    }
}

fn to_domain(request: &ChatCompletionRequest) -> Result<Vec<ChatMessage>, ApiError> {
    if request.messages.is_empty() {
        return Err(ApiError::InvalidRequest(
            "messages must not be empty".to_string(),
        ));
    }
    request
        .messages
        .iter()
        .map(|message| {
            let role = Role::parse(&message.role).ok_or_else(|| {
                ApiError::InvalidRequest(format!("unknown message role `{}`", message.role))
            })?;
            Ok(ChatMessage::new(role, message.content.flatten()))
        })
        .collect()
}

fn engine_options(headers: &HeaderMap, state: &AppState) -> Result<EngineOptions, ApiError> {
    let permission_mode = header_str(headers, HDR_PERMISSION_MODE)?;
    if let Some(mode) = &permission_mode
        && !PERMISSION_MODES.contains(&mode.as_str())
    {
        return Err(ApiError::InvalidRequest(format!(
            "unknown permission mode `{mode}`"
        )));
    }

    Ok(EngineOptions {
        max_turns: header_u32(headers, HDR_MAX_TURNS)?,
        allowed_tools: header_list(headers, HDR_ALLOWED_TOOLS)?,
        disallowed_tools: header_list(headers, HDR_DISALLOWED_TOOLS)?,
        permission_mode,
        max_thinking_tokens: header_u32(headers, HDR_MAX_THINKING_TOKENS)?,
        timeout: Some(state.config.request_timeout),
    })
}

fn header_str(headers: &HeaderMap, name: &str) -> Result<Option<String>, ApiError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::to_string)
                .map_err(|_| ApiError::InvalidRequest(format!("header `{name}` is not valid text")))
        })
        .transpose()
}

fn header_u32(headers: &HeaderMap, name: &str) -> Result<Option<u32>, ApiError> {
    header_str(headers, name)?
        .map(|value| {
            value.trim().parse::<u32>().map_err(|_| {
                ApiError::InvalidRequest(format!("header `{name}` must be a positive integer"))
            })
        })
        .transpose()
}

fn header_list(headers: &HeaderMap, name: &str) -> Result<Option<Vec<String>>, ApiError> {
    Ok(header_str(headers, name)?.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }))
}
