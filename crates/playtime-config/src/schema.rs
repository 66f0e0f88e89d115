//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Departments (named groups of jobs)
    #[serde(default)]
    pub departments: Vec<RawDepartment>,

    /// Job catalog
    #[serde(default)]
    pub jobs: Vec<RawJob>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Whether play-time requirements are enforced (default: true)
    pub role_timers: Option<bool>,

    /// Data directory for the tracking store
    pub data_dir: Option<PathBuf>,

    /// How often every loaded player's time is credited, in seconds (default: 30)
    pub flush_interval_seconds: Option<u64>,
}

/// Raw department definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawDepartment {
    pub id: String,

    /// Display name (defaults to the id)
    pub name: Option<String>,

    /// Member job ids
    #[serde(default)]
    pub jobs: Vec<String>,
}

/// Raw job definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawJob {
    /// Unique stable ID
    pub id: String,

    /// Display name
    pub name: String,

    /// Play-time tracker accrued while holding this job
    pub tracker: Option<String>,

    /// Requirements, checked in order. Absent means unrestricted.
    pub requirements: Option<Vec<RawRequirement>>,
}

/// Raw requirement, tagged by `type`
///
/// Durations are written as `hours`, `minutes` and `seconds` fields that are
/// summed together.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawRequirement {
    OverallPlaytime {
        #[serde(default)]
        hours: u64,
        #[serde(default)]
        minutes: u64,
        #[serde(default)]
        seconds: u64,
        #[serde(default)]
        inverted: bool,
    },
    RoleTime {
        tracker: String,
        #[serde(default)]
        hours: u64,
        #[serde(default)]
        minutes: u64,
        #[serde(default)]
        seconds: u64,
        #[serde(default)]
        inverted: bool,
    },
    DepartmentTime {
        department: String,
        #[serde(default)]
        hours: u64,
        #[serde(default)]
        minutes: u64,
        #[serde(default)]
        seconds: u64,
        #[serde(default)]
        inverted: bool,
    },
    Whitelist,
    Species {
        species: Vec<String>,
        #[serde(default)]
        inverted: bool,
    },
}

impl RawRequirement {
    /// Threshold of a time requirement, `None` for non-time requirements
    pub fn time_parts(&self) -> Option<(u64, u64, u64)> {
        match self {
            RawRequirement::OverallPlaytime { hours, minutes, seconds, .. }
            | RawRequirement::RoleTime { hours, minutes, seconds, .. }
            | RawRequirement::DepartmentTime { hours, minutes, seconds, .. } => {
                Some((*hours, *minutes, *seconds))
            }
            RawRequirement::Whitelist | RawRequirement::Species { .. } => None,
        }
    }
}
