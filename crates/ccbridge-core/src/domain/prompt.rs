//! Message normalization.
//!
//! The engine accepts a single prompt string plus an optional system prompt,
//! not a structured message list. This module flattens an ordered message
//! sequence into that shape: system messages are extracted (the last one
//! wins), and the remaining conversation is rendered with stable role
//! prefixes.

use thiserror::Error;

use super::chat::{ChatMessage, Role};

/// Placeholder substituted for message parts the engine cannot consume
/// (images, binary attachments).
pub const UNSUPPORTED_CONTENT_PLACEHOLDER: &str = "[Image content not supported]";

/// Appended when the final message is not from the user, so the engine
/// always sees an open user turn.
pub const TURN_NUDGE: &str = "Human: Please continue.";

/// A message list rendered into the engine's prompt shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPrompt {
    /// Extracted system prompt, if any system message was present.
    pub system_prompt: Option<String>,
    /// The conversation rendered as a single prompt string.
    pub prompt: String,
}

/// Errors produced while normalizing a message list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    /// The request carried no messages at all.
    #[error("message list is empty")]
    Empty,
}

/// Render an ordered message list into a prompt plus optional system prompt.
///
/// System messages are excluded from the rendered conversation; when several
/// appear, the last one becomes the system prompt. User and assistant
/// messages are rendered as `Human:` / `Assistant:` blocks joined by blank
/// lines, preserving order. If the conversation does not end with a user
/// message, a trailing nudge is appended so the engine has a turn to answer.
pub fn normalize(messages: &[ChatMessage]) -> Result<NormalizedPrompt, PromptError> {
    if messages.is_empty() {
        return Err(PromptError::Empty);
    }

    let mut system_prompt: Option<String> = None;
    let mut parts: Vec<String> = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            Role::System => system_prompt = Some(message.content.clone()),
            Role::User => parts.push(format!("Human: {}", message.content)),
            Role::Assistant => parts.push(format!("Assistant: {}", message.content)),
        }
    }

    let mut prompt = parts.join("\n\n");

    // Keep the conversation open-ended from the user's side.
    if messages
        .last()
        .is_some_and(|last| last.role != Role::User)
    {
        if !prompt.is_empty() {
            prompt.push_str("\n\n");
        }
        prompt.push_str(TURN_NUDGE);
    }

    Ok(NormalizedPrompt {
        system_prompt,
        prompt,
    })
}
