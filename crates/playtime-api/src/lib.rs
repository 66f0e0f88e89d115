//! Shared types for playtime
//!
//! This crate defines the vocabulary shared between the evaluator, the
//! tracking service and the daemon:
//! - Lifecycle events raised by the game engine
//! - Reason codes explaining why a job is locked
//! - Messages pushed to clients (timers, whitelist status)
//! - Request/response types of the daemon's NDJSON protocol

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
