//! Shared application state type.

use std::sync::Arc;
use std::time::Duration;

use ccbridge_core::{EnginePort, SessionStore};
use ccbridge_engine::AuthStatus;

/// HTTP-layer configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Static bearer key; `None` disables request authentication.
    pub api_key: Option<String>,
    /// Per-request engine deadline.
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            request_timeout: Duration::from_secs(600),
        }
    }
}

/// Everything handlers need, wired once at the composition root.
pub struct ApiContext {
    pub engine: Arc<dyn EnginePort>,
    pub sessions: Arc<SessionStore>,
    /// Engine authentication diagnostic, resolved at startup.
    pub auth: AuthStatus,
    pub config: ApiConfig,
}

/// Application state shared across all handlers.
pub type AppState = Arc<ApiContext>;
