//! Port definitions.
//!
//! Ports are the seams between the core and its adapters. The only port in
//! this system is the engine port; the session store is a concrete core
//! service because it has no alternative backends.

pub mod engine;

pub use engine::{
    EngineError, EngineEvent, EngineOptions, EnginePort, EngineRequest, EngineStream, EngineUsage,
    StopReason,
};
