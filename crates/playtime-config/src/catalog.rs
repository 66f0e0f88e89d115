//! Validated job catalog

use crate::requirements::JobRequirement;
use crate::schema::{RawConfig, RawDepartment, RawJob, RawRequirement, RawServiceConfig};
use playtime_util::{DepartmentId, JobId, TrackerId, default_data_dir, duration_from_parts};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Validated catalog ready for use by the evaluator
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Service configuration
    pub service: ServiceConfig,

    /// Departments, in config order
    pub departments: Vec<Department>,

    /// Jobs, in config order
    pub jobs: Vec<JobPrototype>,
}

impl Catalog {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            departments: raw.departments.into_iter().map(Department::from_raw).collect(),
            jobs: raw.jobs.into_iter().map(JobPrototype::from_raw).collect(),
        }
    }

    /// Get job by ID
    pub fn job(&self, id: &JobId) -> Option<&JobPrototype> {
        self.jobs.iter().find(|j| &j.id == id)
    }

    /// Get department by ID
    pub fn department(&self, id: &DepartmentId) -> Option<&Department> {
        self.departments.iter().find(|d| &d.id == id)
    }

    /// Trackers of every job in a department, skipping jobs without one
    pub fn department_trackers(&self, id: &DepartmentId) -> Vec<&TrackerId> {
        let Some(department) = self.department(id) else {
            return Vec::new();
        };

        department
            .jobs
            .iter()
            .filter_map(|job_id| self.job(job_id))
            .filter_map(|job| job.tracker.as_ref())
            .collect()
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// When false, time requirements are not enforced
    pub role_timers: bool,
    pub data_dir: PathBuf,
    pub flush_interval: Duration,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            role_timers: raw.role_timers.unwrap_or(true),
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
            flush_interval: raw
                .flush_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_FLUSH_INTERVAL),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            role_timers: true,
            data_dir: default_data_dir(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

/// A named group of jobs
#[derive(Debug, Clone)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub jobs: Vec<JobId>,
}

impl Department {
    fn from_raw(raw: RawDepartment) -> Self {
        Self {
            name: raw.name.unwrap_or_else(|| raw.id.clone()),
            id: DepartmentId::new(raw.id),
            jobs: raw.jobs.into_iter().map(JobId::new).collect(),
        }
    }
}

/// Validated job definition
#[derive(Debug, Clone)]
pub struct JobPrototype {
    pub id: JobId,
    pub name: String,
    /// Tracker accrued while a player holds this job
    pub tracker: Option<TrackerId>,
    /// Requirements in config order. `None` means unrestricted.
    pub requirements: Option<Vec<JobRequirement>>,
}

impl JobPrototype {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: JobId::new(id),
            name: name.into(),
            tracker: None,
            requirements: None,
        }
    }

    pub fn with_tracker(mut self, tracker: impl Into<String>) -> Self {
        self.tracker = Some(TrackerId::new(tracker));
        self
    }

    pub fn with_requirements(mut self, requirements: Vec<JobRequirement>) -> Self {
        self.requirements = Some(requirements);
        self
    }

    /// Whether this job has at least one requirement
    pub fn is_restricted(&self) -> bool {
        self.requirements.as_ref().is_some_and(|r| !r.is_empty())
    }

    fn from_raw(raw: RawJob) -> Self {
        Self {
            id: JobId::new(raw.id),
            name: raw.name,
            tracker: raw.tracker.map(TrackerId::new),
            requirements: raw
                .requirements
                .map(|reqs| reqs.into_iter().map(convert_requirement).collect()),
        }
    }
}

fn convert_requirement(raw: RawRequirement) -> JobRequirement {
    match raw {
        RawRequirement::OverallPlaytime { hours, minutes, seconds, inverted } => {
            JobRequirement::OverallPlaytime {
                time: duration_from_parts(hours, minutes, seconds),
                inverted,
            }
        }
        RawRequirement::RoleTime { tracker, hours, minutes, seconds, inverted } => {
            JobRequirement::RoleTime {
                tracker: TrackerId::new(tracker),
                time: duration_from_parts(hours, minutes, seconds),
                inverted,
            }
        }
        RawRequirement::DepartmentTime { department, hours, minutes, seconds, inverted } => {
            JobRequirement::DepartmentTime {
                department: DepartmentId::new(department),
                time: duration_from_parts(hours, minutes, seconds),
                inverted,
            }
        }
        RawRequirement::Whitelist => JobRequirement::Whitelist,
        RawRequirement::Species { species, inverted } => JobRequirement::Species {
            species: species.into_iter().collect::<BTreeSet<_>>(),
            inverted,
        },
    }
}
