//! Shared utilities for playtime
//!
//! This crate provides:
//! - ID types (UserId, EntityId, MindId, JobId, TrackerId, DepartmentId)
//! - Time utilities (monotonic time, duration helpers)
//! - Error types
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
