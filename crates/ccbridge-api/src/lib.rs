//! Axum HTTP adapter: the OpenAI-compatible surface over the engine and the
//! session store.
//!
//! Wire types live in [`models`]; the streaming translator in [`stream`];
//! the non-streaming collector in [`collect`]; request handlers under
//! [`handlers`]. [`server::serve`] runs the composed router until cancelled.

pub mod auth;
pub mod collect;
pub mod compat;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;
pub mod stream;

pub use error::ApiError;
pub use routes::{CorsConfig, create_router};
pub use server::serve;
pub use state::{ApiConfig, ApiContext, AppState};
