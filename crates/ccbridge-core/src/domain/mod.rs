//! Chat domain model.

pub mod chat;
pub mod prompt;

pub use chat::{ChatMessage, Role};
pub use prompt::{
    NormalizedPrompt, PromptError, TURN_NUDGE, UNSUPPORTED_CONTENT_PLACEHOLDER, normalize,
};
