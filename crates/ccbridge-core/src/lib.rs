//! Core domain types and port definitions for ccbridge.
//!
//! This crate is infrastructure-free: it defines the chat domain model, the
//! engine port (the seam to the external conversational-AI process), and the
//! in-memory session store. Adapters live in `ccbridge-engine` (process
//! management) and `ccbridge-api` (HTTP surface).

pub mod domain;
pub mod ports;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::{
    ChatMessage, NormalizedPrompt, PromptError, Role, TURN_NUDGE, UNSUPPORTED_CONTENT_PLACEHOLDER,
    normalize,
};
pub use ports::{
    EngineError, EngineEvent, EngineOptions, EnginePort, EngineRequest, EngineStream, EngineUsage,
    StopReason,
};
pub use services::{
    SessionConfig, SessionError, SessionHandle, SessionSnapshot, SessionStore, StoreStats,
};
