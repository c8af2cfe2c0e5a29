//! Core services.

pub mod session;

pub use session::{
    SessionConfig, SessionError, SessionHandle, SessionSnapshot, SessionStore, StoreStats,
};
