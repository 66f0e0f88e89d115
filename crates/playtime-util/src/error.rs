//! Error types shared across playtime crates

use thiserror::Error;

use crate::{JobId, UserId};

/// Cross-crate error type for playtime operations
#[derive(Debug, Error)]
pub enum PlaytimeError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Player not connected: {0}")]
    PlayerNotFound(UserId),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PlaytimeError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PlaytimeError>;
