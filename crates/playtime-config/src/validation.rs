//! Configuration validation

use crate::schema::{RawConfig, RawJob, RawRequirement};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Job '{job_id}': {message}")]
    JobError { job_id: String, message: String },

    #[error("Duplicate job ID: {0}")]
    DuplicateJobId(String),

    #[error("Duplicate department ID: {0}")]
    DuplicateDepartmentId(String),

    #[error("Department '{department}' lists unknown job '{job_id}'")]
    UnknownDepartmentJob { department: String, job_id: String },

    #[error("Job '{job_id}' requires time in unknown department '{department}'")]
    UnknownDepartment { job_id: String, department: String },

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration, collecting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.service.flush_interval_seconds == Some(0) {
        errors.push(ValidationError::GlobalError(
            "flush_interval_seconds must be greater than zero".into(),
        ));
    }

    let mut job_ids = HashSet::new();
    for job in &config.jobs {
        if !job_ids.insert(job.id.as_str()) {
            errors.push(ValidationError::DuplicateJobId(job.id.clone()));
        }
    }

    let mut department_ids = HashSet::new();
    for department in &config.departments {
        if !department_ids.insert(department.id.as_str()) {
            errors.push(ValidationError::DuplicateDepartmentId(department.id.clone()));
        }
        for job_id in &department.jobs {
            if !job_ids.contains(job_id.as_str()) {
                errors.push(ValidationError::UnknownDepartmentJob {
                    department: department.id.clone(),
                    job_id: job_id.clone(),
                });
            }
        }
    }

    for job in &config.jobs {
        errors.extend(validate_job(job, &department_ids));
    }

    errors
}

fn validate_job(job: &RawJob, departments: &HashSet<&str>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let job_error = |message: &str| ValidationError::JobError {
        job_id: job.id.clone(),
        message: message.into(),
    };

    if job.id.trim().is_empty() {
        errors.push(job_error("id cannot be empty"));
    }

    if job.tracker.as_deref().is_some_and(|t| t.trim().is_empty()) {
        errors.push(job_error("tracker cannot be blank; omit it instead"));
    }

    for requirement in job.requirements.iter().flatten() {
        if requirement.time_parts() == Some((0, 0, 0)) {
            errors.push(job_error("time requirement must be longer than zero"));
        }

        match requirement {
            RawRequirement::RoleTime { tracker, .. } if tracker.trim().is_empty() => {
                errors.push(job_error("role_time tracker cannot be blank"));
            }
            RawRequirement::DepartmentTime { department, .. }
                if !departments.contains(department.as_str()) =>
            {
                errors.push(ValidationError::UnknownDepartment {
                    job_id: job.id.clone(),
                    department: department.clone(),
                });
            }
            RawRequirement::Species { species, .. } if species.is_empty() => {
                errors.push(job_error("species list cannot be empty"));
            }
            _ => {}
        }
    }

    errors
}
