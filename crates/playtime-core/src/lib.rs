//! Core job eligibility and play-time tracking for playtime
//!
//! This crate contains:
//! - Job eligibility (which trackers accrue, which jobs a player may take)
//! - The tracking service contract and its in-memory implementation
//! - Explicit lifecycle event registration

mod bus;
mod eligibility;
mod tracking;

pub use bus::*;
pub use eligibility::*;
pub use tracking::*;
