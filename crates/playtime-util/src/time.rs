//! Time utilities for playtime
//!
//! Play time is accrued against monotonic time so that wall-clock jumps on
//! the host never credit or debit a tracker. Wall-clock time is only used
//! for timestamps (audit log, client event envelopes).

use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

/// Current local time
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// A point in monotonic time. Immune to wall-clock changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicInstant(Instant);

impl MonotonicInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    /// Duration since `earlier`, zero if `earlier` is actually later.
    pub fn duration_since(&self, earlier: MonotonicInstant) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }
}

impl std::ops::Add<Duration> for MonotonicInstant {
    type Output = MonotonicInstant;

    fn add(self, rhs: Duration) -> Self::Output {
        MonotonicInstant(self.0 + rhs)
    }
}

/// Format a duration the way players read play time: `12h 5m`, `5m 30s`, `30s`.
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Build a duration from hour/minute/second parts, as written in config.
pub fn duration_from_parts(hours: u64, minutes: u64, seconds: u64) -> Duration {
    Duration::from_secs(
        hours
            .saturating_mul(3600)
            .saturating_add(minutes.saturating_mul(60))
            .saturating_add(seconds),
    )
}
