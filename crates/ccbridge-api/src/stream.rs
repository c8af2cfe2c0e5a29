//! Engine-events → SSE streaming translator.
//!
//! Consumes the engine's event stream and re-emits it as OpenAI
//! chat-completion chunks in pre-formatted `data:` frames, in the exact
//! order the fragments arrived. The completed turn is persisted into the
//! session store only once the terminal event is seen; a failure after
//! streaming has begun still produces a terminal chunk and the `[DONE]`
//! sentinel so client parsers never hang.

use std::collections::VecDeque;
use std::convert::Infallible;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use ccbridge_core::{ChatMessage, EngineEvent, EngineStream, SessionHandle};
use futures_util::StreamExt;
use futures_util::stream;
use tracing::{debug, warn};

use crate::models::{ChatCompletionChunk, Usage};

/// The session half of one in-flight completion: the exclusive handle plus
/// the user message to persist alongside the assistant reply.
pub struct SessionTurn {
    pub handle: SessionHandle,
    pub user: Option<ChatMessage>,
}

/// Per-request identity shared by the streaming and non-streaming paths.
pub struct CompletionContext {
    pub request_id: String,
    pub created: i64,
    pub model: String,
    pub session: Option<SessionTurn>,
}

impl CompletionContext {
    /// The session id, when running in session mode.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session
            .as_ref()
            .map(|turn| turn.handle.id().to_string())
    }

    /// Persist the completed turn. Continuity is best-effort: a lost session
    /// is logged and otherwise ignored — content already delivered to the
    /// client is never retracted.
    pub fn persist(&mut self, assistant_text: &str) {
        let Some(turn) = self.session.as_mut() else {
            return;
        };
        let Some(user) = turn.user.clone() else {
            debug!(
                session_id = %turn.handle.id(),
                "turn carried no user message; skipping session persistence"
            );
            return;
        };
        let model = Some(self.model.clone());
        match turn
            .handle
            .append_turn(user, ChatMessage::assistant(assistant_text), model)
        {
            Ok(()) => debug!(session_id = %turn.handle.id(), "session turn persisted"),
            Err(e) => warn!(
                session_id = %turn.handle.id(),
                error = %e,
                "session continuity lost; response already sent is unaffected"
            ),
        }
    }
}

/// Build the SSE response for one engine invocation.
#[must_use]
pub fn sse_response(events: EngineStream, ctx: CompletionContext) -> Response {
    let state = TranslateState {
        events: Some(events),
        ctx,
        preamble_sent: false,
        accumulated: String::new(),
        pending: VecDeque::new(),
    };
    let frames = stream::unfold(state, next_frame).map(Ok::<_, Infallible>);

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .header("cache-control", "no-cache")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(frames))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// State threaded through the `unfold` stream.
struct TranslateState {
    /// Cleared once the response is finalized; dropping it tears down the
    /// engine invocation.
    events: Option<EngineStream>,
    ctx: CompletionContext,
    preamble_sent: bool,
    accumulated: String,
    pending: VecDeque<Bytes>,
}

impl TranslateState {
    fn push_chunk(&mut self, chunk: &ChatCompletionChunk) {
        let json = serde_json::to_string(chunk).unwrap_or_default();
        self.pending.push_back(Bytes::from(format!("data: {json}\n\n")));
    }

    fn push_preamble_once(&mut self) {
        if !self.preamble_sent {
            self.preamble_sent = true;
            let chunk = ChatCompletionChunk::preamble(
                &self.ctx.request_id,
                self.ctx.created,
                &self.ctx.model,
            );
            self.push_chunk(&chunk);
        }
    }

    /// Close out the stream: terminal chunk, then the `[DONE]` sentinel.
    fn finish(&mut self, finish_reason: &'static str, usage: Option<Usage>) {
        self.push_preamble_once();
        let chunk = ChatCompletionChunk::terminal(
            &self.ctx.request_id,
            self.ctx.created,
            &self.ctx.model,
            finish_reason,
            usage,
        );
        self.push_chunk(&chunk);
        self.pending.push_back(Bytes::from_static(b"data: [DONE]\n\n"));
        self.events = None;
    }
}

async fn next_frame(mut st: TranslateState) -> Option<(Bytes, TranslateState)> {
    loop {
        if let Some(frame) = st.pending.pop_front() {
            return Some((frame, st));
        }
        let Some(events) = st.events.as_mut() else {
            return None;
        };

        match events.next().await {
            Some(Ok(EngineEvent::SystemInit { session_id, model })) => {
                debug!(upstream_session = %session_id, upstream_model = %model, "engine initialized");
            }
            Some(Ok(EngineEvent::AssistantDelta { text })) => {
                st.accumulated.push_str(&text);
                st.push_preamble_once();
                let chunk = ChatCompletionChunk::content(
                    &st.ctx.request_id,
                    st.ctx.created,
                    &st.ctx.model,
                    text,
                );
                st.push_chunk(&chunk);
            }
            Some(Ok(EngineEvent::Tool { .. })) => {
                debug!("engine tool activity (not forwarded to client)");
            }
            Some(Ok(EngineEvent::Result {
                text,
                usage,
                stop_reason,
            })) => {
                let assistant_text = if text.is_empty() {
                    std::mem::take(&mut st.accumulated)
                } else {
                    text
                };
                st.ctx.persist(&assistant_text);
                st.finish(stop_reason.as_finish_reason(), Some(usage.into()));
            }
            Some(Err(e)) => {
                warn!(error = %e, "engine stream failed mid-response");
                st.finish("error", None);
            }
            None => {
                warn!("engine stream ended without a result event");
                st.finish("error", None);
            }
        }
    }
}
