//! Shared types for the playtime API

use playtime_util::{DepartmentId, TrackerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Well-known tracker accrued by every living, non-AFK player
pub const TRACKER_OVERALL: &str = "overall";

/// Well-known tracker accrued by admins instead of role trackers
pub const TRACKER_ADMIN: &str = "admin";

/// Snapshot of accumulated time per tracker for one player
pub type TrackerTimes = BTreeMap<TrackerId, Duration>;

/// Life state of a mob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobState {
    Alive,
    Critical,
    Dead,
}

impl MobState {
    /// Whether a player in this state should be accruing play time.
    pub fn accrues_play_time(&self) -> bool {
        matches!(self, MobState::Alive | MobState::Critical)
    }
}

/// Structured reason codes for why a job is locked for a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ReasonCode {
    /// Not enough time on a tracker
    InsufficientPlaytime {
        tracker: TrackerId,
        required: Duration,
        current: Duration,
    },
    /// Too much time on a tracker (inverted requirement)
    TooMuchPlaytime {
        tracker: TrackerId,
        limit: Duration,
        current: Duration,
    },
    /// Not enough combined time across a department's jobs
    InsufficientDepartmentTime {
        department: DepartmentId,
        required: Duration,
        current: Duration,
    },
    /// Too much combined time across a department's jobs (inverted requirement)
    TooMuchDepartmentTime {
        department: DepartmentId,
        limit: Duration,
        current: Duration,
    },
    /// Job is restricted to whitelisted players
    NotWhitelisted,
    /// Selected character's species may not take this job
    SpeciesNotAllowed { species: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mob_state_accrual() {
        assert!(MobState::Alive.accrues_play_time());
        assert!(MobState::Critical.accrues_play_time());
        assert!(!MobState::Dead.accrues_play_time());
    }

    #[test]
    fn reason_code_serialization() {
        let reason = ReasonCode::InsufficientPlaytime {
            tracker: TrackerId::new(TRACKER_OVERALL),
            required: Duration::from_secs(36_000),
            current: Duration::from_secs(18_000),
        };

        let json = serde_json::to_string(&reason).unwrap();
        assert!(json.contains("insufficient_playtime"));

        let parsed: ReasonCode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reason);
    }

    #[test]
    fn mob_state_is_snake_case() {
        let parsed: MobState = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(parsed, MobState::Critical);
    }
}
