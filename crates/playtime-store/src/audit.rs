//! Audit event types

use chrono::{DateTime, Local};
use playtime_util::{JobId, UserId};
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Job catalog loaded
    CatalogLoaded {
        job_count: usize,
        department_count: usize,
    },

    /// Player's tracker totals loaded into the tracking service
    PlayerLoaded { user_id: UserId },

    /// Player flushed and dropped from the tracking service
    PlayerUnloaded { user_id: UserId },

    /// Dirty tracker totals written
    PlayTimeSaved { players: usize, rows: usize },

    /// A job was refused with explained reasons
    JobDenied {
        user_id: UserId,
        job_id: JobId,
        reasons: Vec<String>,
    },

    /// Round restarted
    RoundRestarted,
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: playtime_util::now(),
            event,
        }
    }
}
