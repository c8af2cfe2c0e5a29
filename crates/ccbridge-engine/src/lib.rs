//! Claude CLI adapter.
//!
//! Implements [`ccbridge_core::EnginePort`] by spawning the `claude` binary
//! in non-interactive mode with newline-delimited JSON output, decoding each
//! line into an engine event. One invocation owns one child process; the
//! process is killed when the event stream is dropped.

pub mod auth;
pub mod binary;
mod decode;
pub mod engine;

pub use auth::{AuthEnv, AuthMethod, AuthStatus};
pub use binary::{DEFAULT_BINARY, probe, resolve_binary};
pub use engine::{ClaudeEngine, EngineConfig};
