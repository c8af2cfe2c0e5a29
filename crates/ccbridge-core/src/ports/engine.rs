//! Engine port: the seam to the external conversational-AI process.
//!
//! One invocation corresponds to one engine process lifetime. The engine is
//! stateless per invocation and is driven entirely through [`EngineRequest`];
//! its output arrives as a finite, single-pass stream of [`EngineEvent`]s
//! terminated by exactly one `Result` event.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

/// A finite, non-restartable sequence of engine events.
///
/// Dropping the stream before exhaustion must release the underlying
/// process; implementations guarantee no resource leak on early exit.
pub type EngineStream = BoxStream<'static, Result<EngineEvent, EngineError>>;

/// Engine-specific tuning options carried alongside a request.
///
/// These map directly onto engine invocation flags; `None` means "engine
/// default". The core never interprets them.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Maximum agentic turns the engine may take for one invocation.
    pub max_turns: Option<u32>,
    /// Tools the engine is allowed to use.
    pub allowed_tools: Option<Vec<String>>,
    /// Tools the engine must not use.
    pub disallowed_tools: Option<Vec<String>>,
    /// Permission mode passed through to the engine.
    pub permission_mode: Option<String>,
    /// Thinking-token budget passed through to the engine.
    pub max_thinking_tokens: Option<u32>,
    /// Per-invocation deadline override.
    pub timeout: Option<Duration>,
}

/// A single engine invocation.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// The rendered conversation prompt.
    pub prompt: String,
    /// Optional system prompt extracted from the conversation.
    pub system_prompt: Option<String>,
    /// Model to use; `None` lets the engine pick its default.
    pub model: Option<String>,
    /// Engine tuning options.
    pub options: EngineOptions,
}

impl EngineRequest {
    /// Create a request with required fields.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            model: None,
            options: EngineOptions::default(),
        }
    }

    /// Set the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Set the engine options.
    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }
}

/// Token and cost accounting reported by the engine.
///
/// Cost is pass-through: the engine computes it, the core only carries it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// Why the engine stopped producing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Normal completion.
    EndTurn,
    /// The turn limit cut the response short.
    MaxTurns,
    /// The engine reported an error; the message is engine-supplied.
    Error(String),
}

impl StopReason {
    /// Map to the OpenAI `finish_reason` vocabulary.
    #[must_use]
    pub const fn as_finish_reason(&self) -> &'static str {
        match self {
            Self::EndTurn => "stop",
            Self::MaxTurns => "length",
            Self::Error(_) => "error",
        }
    }
}

/// One event from a running engine invocation.
///
/// Events arrive strictly in engine-delivery order. Exactly one `Result`
/// terminates a successful invocation and is always last.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The engine announced itself: upstream session id and resolved model.
    SystemInit { session_id: String, model: String },
    /// An incremental fragment of assistant text.
    AssistantDelta { text: String },
    /// An opaque tool-activity signal; never client-visible content.
    Tool { payload: serde_json::Value },
    /// Terminal event carrying the final text, usage, and stop reason.
    Result {
        text: String,
        usage: EngineUsage,
        stop_reason: StopReason,
    },
}

/// Errors produced by the engine port.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine process/connection could not be established.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The configured invocation deadline was exceeded.
    #[error("engine timed out after {0:?}")]
    Timeout(Duration),

    /// The event stream ended without a terminal result event.
    #[error("engine stream ended without a result event")]
    Incomplete,

    /// An event line could not be decoded.
    #[error("failed to decode engine event: {0}")]
    Decode(String),
}

impl EngineError {
    /// Returns a suggested HTTP status code for this error.
    #[must_use]
    pub const fn suggested_status_code(&self) -> u16 {
        match self {
            Self::Unavailable(_) | Self::Incomplete | Self::Decode(_) => 502,
            Self::Timeout(_) => 504,
        }
    }

    /// Stable error-type discriminant for client payloads.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "engine_unavailable",
            Self::Timeout(_) => "engine_timeout",
            Self::Incomplete | Self::Decode(_) => "incomplete_response",
        }
    }
}

/// Port for invoking the external engine.
///
/// Implementations own the process lifecycle for the duration of one
/// invocation and must tear it down when the returned stream is dropped.
#[async_trait]
pub trait EnginePort: Send + Sync {
    /// Start one engine invocation and return its event stream.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Unavailable` if the invocation could not be
    /// started; failures after startup travel inside the stream.
    async fn invoke(&self, request: EngineRequest) -> Result<EngineStream, EngineError>;
}
