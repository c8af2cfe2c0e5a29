//! Non-streaming collector.
//!
//! Drives the same engine event stream as the streaming translator, but
//! buffers until the terminal event and returns one complete response.
//! Session persistence follows the identical rule: only on the terminal
//! event, one atomic turn.

use axum::Json;
use axum::response::{IntoResponse, Response};
use ccbridge_core::{EngineError, EngineEvent, EngineStream};
use futures_util::StreamExt;
use tracing::debug;

use crate::error::ApiError;
use crate::models::{ChatCompletionResponse, Choice, ResponseMessage};
use crate::stream::CompletionContext;

/// Exhaust the engine stream and build the single JSON response.
///
/// # Errors
///
/// Engine faults surface as a single structured error with the same
/// taxonomy the streaming path uses for its diagnostic terminal chunk.
pub async fn json_response(
    mut events: EngineStream,
    mut ctx: CompletionContext,
) -> Result<Response, ApiError> {
    let mut accumulated = String::new();

    while let Some(item) = events.next().await {
        match item? {
            EngineEvent::SystemInit { session_id, model } => {
                debug!(upstream_session = %session_id, upstream_model = %model, "engine initialized");
            }
            EngineEvent::AssistantDelta { text } => accumulated.push_str(&text),
            EngineEvent::Tool { .. } => {
                debug!("engine tool activity (not forwarded to client)");
            }
            EngineEvent::Result {
                text,
                usage,
                stop_reason,
            } => {
                let assistant_text = if text.is_empty() {
                    std::mem::take(&mut accumulated)
                } else {
                    text
                };
                ctx.persist(&assistant_text);

                let response = ChatCompletionResponse {
                    id: ctx.request_id.clone(),
                    object: "chat.completion",
                    created: ctx.created,
                    model: ctx.model.clone(),
                    choices: vec![Choice {
                        index: 0,
                        message: ResponseMessage {
                            role: "assistant",
                            content: assistant_text,
                        },
                        finish_reason: stop_reason.as_finish_reason(),
                    }],
                    usage: usage.into(),
                    session_id: ctx.session_id(),
                };
                return Ok(Json(response).into_response());
            }
        }
    }

    Err(EngineError::Incomplete.into())
}
