//! OpenAI API data models for request/response handling.
//!
//! These types match the OpenAI chat-completion wire format, plus the
//! `session_id` extension this server adds for conversation continuity.
//! Domain types live in `ccbridge-core`; this module handles the API layer
//! mapping.

use ccbridge_core::{EngineUsage, SessionSnapshot, UNSUPPORTED_CONTENT_PLACEHOLDER};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Chat Completion Request Types
// =============================================================================

/// Message content: OpenAI accepts a plain string or an array of typed parts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One element of a multi-part message.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    /// Part type, e.g. "text" or "image_url".
    #[serde(rename = "type")]
    pub kind: String,
    /// Text payload for "text" parts.
    #[serde(default)]
    pub text: Option<String>,
}

impl MessageContent {
    /// Flatten to plain text. Non-text parts become a fixed placeholder —
    /// the engine consumes text only.
    #[must_use]
    pub fn flatten(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .map(|part| match (part.kind.as_str(), &part.text) {
                    ("text", Some(text)) => text.clone(),
                    _ => UNSUPPORTED_CONTENT_PLACEHOLDER.to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A single chat message as supplied on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: MessageContent,
    #[serde(default)]
    pub name: Option<String>,
}

/// Request to /v1/chat/completions.
///
/// Sampling parameters are accepted for OpenAI-client compatibility but the
/// engine does not expose them; see [`crate::compat`] for which are honored.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub stream: bool,
    /// Extension: opt into server-side conversation continuity.
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub n: Option<u32>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
    #[serde(default)]
    pub stop: Option<serde_json::Value>,
    #[serde(default)]
    pub presence_penalty: Option<f64>,
    #[serde(default)]
    pub frequency_penalty: Option<f64>,
    #[serde(default)]
    pub logit_bias: Option<serde_json::Value>,
    #[serde(default)]
    pub user: Option<String>,
}

/// Generate a fresh chat-completion id.
#[must_use]
pub fn request_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4().simple())
}

// =============================================================================
// Chat Completion Response Types
// =============================================================================

/// Token usage statistics, OpenAI shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl From<EngineUsage> for Usage {
    fn from(usage: EngineUsage) -> Self {
        Self {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: usage.input_tokens + usage.output_tokens,
        }
    }
}

/// The assistant message inside a non-streaming choice.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseMessage {
    pub role: &'static str,
    pub content: String,
}

/// A single completion choice.
#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: &'static str,
}

/// Response from /v1/chat/completions (non-streaming).
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    /// Extension: present when the request ran in session mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Delta content in a streaming chunk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// A single streaming choice.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<&'static str>,
}

/// Streaming chunk from /v1/chat/completions.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    /// Attached to the terminal chunk once the engine reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatCompletionChunk {
    fn base(id: &str, created: i64, model: &str, choice: ChunkChoice) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk",
            created,
            model: model.to_string(),
            choices: vec![choice],
            usage: None,
        }
    }

    /// The one-time preamble chunk carrying the assistant role.
    #[must_use]
    pub fn preamble(id: &str, created: i64, model: &str) -> Self {
        Self::base(
            id,
            created,
            model,
            ChunkChoice {
                index: 0,
                delta: Delta {
                    role: Some("assistant"),
                    content: Some(String::new()),
                },
                finish_reason: None,
            },
        )
    }

    /// One incremental content fragment.
    #[must_use]
    pub fn content(id: &str, created: i64, model: &str, text: String) -> Self {
        Self::base(
            id,
            created,
            model,
            ChunkChoice {
                index: 0,
                delta: Delta {
                    role: None,
                    content: Some(text),
                },
                finish_reason: None,
            },
        )
    }

    /// The terminal chunk carrying the finish reason and, when available,
    /// usage.
    #[must_use]
    pub fn terminal(
        id: &str,
        created: i64,
        model: &str,
        finish_reason: &'static str,
        usage: Option<Usage>,
    ) -> Self {
        let mut chunk = Self::base(
            id,
            created,
            model,
            ChunkChoice {
                index: 0,
                delta: Delta::default(),
                finish_reason: Some(finish_reason),
            },
        );
        chunk.usage = usage;
        chunk
    }
}

// =============================================================================
// Models Endpoint Types
// =============================================================================

/// Models the engine accepts; served as a static catalog.
pub const SUPPORTED_MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-opus-4-20250514",
    "claude-3-7-sonnet-20250219",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
];

/// Response from /v1/models.
#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub object: &'static str,
    pub data: Vec<ModelInfo>,
}

/// Information about a single model (OpenAI format).
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub object: &'static str,
    pub owned_by: &'static str,
}

impl ModelsResponse {
    /// The static model catalog.
    #[must_use]
    pub fn catalog() -> Self {
        Self {
            object: "list",
            data: SUPPORTED_MODELS
                .iter()
                .copied()
                .map(|id| ModelInfo {
                    id,
                    object: "model",
                    owned_by: "anthropic",
                })
                .collect(),
        }
    }
}

// =============================================================================
// Session Endpoint Types
// =============================================================================

/// One session's metadata as exposed over HTTP.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub message_count: usize,
    pub turn_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl From<SessionSnapshot> for SessionInfo {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            session_id: snapshot.id,
            created_at: snapshot.created_at,
            last_accessed_at: snapshot.last_accessed_at,
            expires_at: snapshot.expires_at,
            message_count: snapshot.message_count,
            turn_count: snapshot.turn_count,
            model: snapshot.model,
        }
    }
}

/// Response from GET /v1/sessions.
#[derive(Debug, Clone, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
    pub count: usize,
}

// =============================================================================
// Error Response Types
// =============================================================================

/// Error response matching the OpenAI error object.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail within an error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                r#type: error_type.into(),
                code: None,
            },
        }
    }

    /// Create an error response with a code.
    pub fn with_code(
        message: impl Into<String>,
        error_type: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                r#type: error_type.into(),
                code: Some(code.into()),
            },
        }
    }
}
