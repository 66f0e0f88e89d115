//! Host collaborator interfaces for playtime
//!
//! This crate defines the traits through which the evaluator reads the game
//! host: sessions, minds and their roles, mob life states, admin and AFK
//! status, and character preferences. It contains no engine code itself;
//! `MockWorld` is an in-memory host for tests and the playtimed harness.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
