//! Store trait definitions

use playtime_api::TrackerTimes;
use playtime_util::{TrackerId, UserId};
use std::time::Duration;

use crate::{AuditEvent, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Play time

    /// Every persisted tracker total for a player. Unknown players have none.
    fn get_play_times(&self, user_id: &UserId) -> StoreResult<TrackerTimes>;

    /// Overwrite tracker totals, all or nothing
    fn save_play_times(&self, updates: &[PlayTimeUpdate]) -> StoreResult<()>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// A player's new total on one tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayTimeUpdate {
    pub user_id: UserId,
    pub tracker: TrackerId,
    pub time: Duration,
}

impl PlayTimeUpdate {
    pub fn new(user_id: UserId, tracker: TrackerId, time: Duration) -> Self {
        Self {
            user_id,
            tracker,
            time,
        }
    }
}
