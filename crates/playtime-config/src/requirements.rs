//! Job requirements and their evaluation

use crate::catalog::{Catalog, JobPrototype};
use playtime_api::{ReasonCode, TRACKER_OVERALL, TrackerTimes};
use playtime_util::{DepartmentId, TrackerId};
use std::collections::BTreeSet;
use std::time::Duration;

/// A single rule gating a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequirement {
    /// Time on the overall tracker
    OverallPlaytime { time: Duration, inverted: bool },
    /// Time on one specific tracker
    RoleTime {
        tracker: TrackerId,
        time: Duration,
        inverted: bool,
    },
    /// Combined time on the trackers of every job in a department
    DepartmentTime {
        department: DepartmentId,
        time: Duration,
        inverted: bool,
    },
    /// Player must be whitelisted
    Whitelist,
    /// Selected character's species must be in the set (or, inverted, must not be)
    Species {
        species: BTreeSet<String>,
        inverted: bool,
    },
}

/// Everything a requirement may look at
#[derive(Debug, Clone, Copy)]
pub struct RequirementContext<'a> {
    /// Snapshot of the player's accumulated time
    pub play_times: &'a TrackerTimes,
    /// When false, time requirements are always met
    pub role_timers: bool,
    pub whitelisted: bool,
    /// Selected character's species, empty if no character is selected
    pub species: &'a str,
    /// Used to resolve department membership
    pub catalog: &'a Catalog,
}

impl RequirementContext<'_> {
    fn tracker_time(&self, tracker: &TrackerId) -> Duration {
        self.play_times.get(tracker).copied().unwrap_or(Duration::ZERO)
    }
}

impl JobRequirement {
    /// Check the requirement, explaining a failure
    pub fn check(&self, ctx: &RequirementContext<'_>) -> Result<(), ReasonCode> {
        match self {
            JobRequirement::OverallPlaytime { time, inverted } => {
                let tracker = TrackerId::new(TRACKER_OVERALL);
                let current = ctx.tracker_time(&tracker);
                check_tracker_time(ctx, tracker, current, *time, *inverted)
            }
            JobRequirement::RoleTime { tracker, time, inverted } => {
                let current = ctx.tracker_time(tracker);
                check_tracker_time(ctx, tracker.clone(), current, *time, *inverted)
            }
            JobRequirement::DepartmentTime { department, time, inverted } => {
                if !ctx.role_timers {
                    return Ok(());
                }
                let current: Duration = ctx
                    .catalog
                    .department_trackers(department)
                    .into_iter()
                    .map(|tracker| ctx.tracker_time(tracker))
                    .sum();

                match (*inverted, current >= *time) {
                    (false, true) | (true, false) => Ok(()),
                    (false, false) => Err(ReasonCode::InsufficientDepartmentTime {
                        department: department.clone(),
                        required: *time,
                        current,
                    }),
                    (true, true) => Err(ReasonCode::TooMuchDepartmentTime {
                        department: department.clone(),
                        limit: *time,
                        current,
                    }),
                }
            }
            JobRequirement::Whitelist => {
                if ctx.whitelisted {
                    Ok(())
                } else {
                    Err(ReasonCode::NotWhitelisted)
                }
            }
            JobRequirement::Species { species, inverted } => {
                // No selected character: nothing to gate on yet.
                if ctx.species.is_empty() {
                    return Ok(());
                }
                if species.contains(ctx.species) != *inverted {
                    Ok(())
                } else {
                    Err(ReasonCode::SpeciesNotAllowed {
                        species: ctx.species.to_string(),
                    })
                }
            }
        }
    }

    /// Whether the requirement is met
    pub fn is_met(&self, ctx: &RequirementContext<'_>) -> bool {
        self.check(ctx).is_ok()
    }
}

fn check_tracker_time(
    ctx: &RequirementContext<'_>,
    tracker: TrackerId,
    current: Duration,
    time: Duration,
    inverted: bool,
) -> Result<(), ReasonCode> {
    if !ctx.role_timers {
        return Ok(());
    }
    match (inverted, current >= time) {
        (false, true) | (true, false) => Ok(()),
        (false, false) => Err(ReasonCode::InsufficientPlaytime {
            tracker,
            required: time,
            current,
        }),
        (true, true) => Err(ReasonCode::TooMuchPlaytime {
            tracker,
            limit: time,
            current,
        }),
    }
}

/// Whether every requirement of a job is met. Unrestricted jobs always pass.
pub fn try_requirements_met(job: &JobPrototype, ctx: &RequirementContext<'_>) -> bool {
    job.requirements
        .iter()
        .flatten()
        .all(|requirement| requirement.is_met(ctx))
}

/// Every failed requirement of a job, in requirement order
pub fn requirement_failures(job: &JobPrototype, ctx: &RequirementContext<'_>) -> Vec<ReasonCode> {
    job.requirements
        .iter()
        .flatten()
        .filter_map(|requirement| requirement.check(ctx).err())
        .collect()
}
