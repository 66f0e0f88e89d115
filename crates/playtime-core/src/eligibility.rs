//! Job eligibility evaluation
//!
//! [`JobEligibility`] decides which trackers a player accrues and whether a
//! player may take a job. It relays lifecycle events to the tracking service
//! so active trackers are recomputed when a player's state changes.

use playtime_api::{LifecycleEvent, ReasonCode, TRACKER_ADMIN, TRACKER_OVERALL, TrackerTimes};
use playtime_config::{Catalog, JobPrototype, RequirementContext, requirement_failures, try_requirements_met};
use playtime_host_api::{HostServices, PlayerSession};
use playtime_util::{JobId, TrackerId, UserId};
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use tracing::{debug, error};

use crate::{CalculatorId, LifecycleBus, LifecycleObserver, SubscriptionId, TrackerCalculator, TrackingService};

/// Everything requirement checks read for one player, gathered once
struct PlayerInputs {
    play_times: TrackerTimes,
    whitelisted: bool,
    species: String,
}

/// Gates jobs on play time, whitelist and species
pub struct JobEligibility {
    catalog: Arc<Catalog>,
    tracking: Arc<dyn TrackingService>,
    host: HostServices,
}

impl JobEligibility {
    pub fn new(catalog: Arc<Catalog>, tracking: Arc<dyn TrackingService>, host: HostServices) -> Self {
        Self {
            catalog,
            tracking,
            host,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Subscribe to `bus` and install as a tracker calculator
    pub fn register(self: &Arc<Self>, bus: &LifecycleBus) -> Registration {
        let subscription = bus.subscribe(self.clone());
        let weak: Weak<Self> = Arc::downgrade(self);
        let calculator: Weak<dyn TrackerCalculator> = weak;
        let calculator = self.tracking.add_calculator(calculator);

        debug!("Job eligibility registered");
        Registration {
            bus: bus.clone(),
            subscription,
            tracking: self.tracking.clone(),
            calculator,
        }
    }

    /// Trackers the player should be accruing right now
    pub fn determine_trackers(&self, session: &PlayerSession) -> BTreeSet<TrackerId> {
        let user_id = &session.user_id;
        let mut trackers = BTreeSet::new();

        if self.host.afk.is_afk(user_id) {
            return trackers;
        }

        if self.host.admins.is_admin(user_id) {
            trackers.insert(TrackerId::new(TRACKER_ADMIN));
            trackers.insert(TrackerId::new(TRACKER_OVERALL));
            return trackers;
        }

        let alive = session
            .attached_entity
            .and_then(|entity| self.host.entities.mob_state(entity))
            .is_some_and(|state| state.accrues_play_time());
        if !alive {
            return trackers;
        }

        trackers.insert(TrackerId::new(TRACKER_OVERALL));

        if let Some(mind) = self.host.minds.mind_of(user_id) {
            trackers.extend(
                self.host
                    .minds
                    .roles_of(mind)
                    .into_iter()
                    .filter_map(|role| role.tracker)
                    .filter(|tracker| !tracker.is_blank()),
            );
        }

        trackers
    }

    /// Whether the player may take the job. Unknown jobs are allowed.
    pub fn is_allowed(&self, session: &PlayerSession, job_id: &JobId) -> bool {
        let Some(job) = self.restricted_job(job_id) else {
            return true;
        };

        let inputs = self.gather(session);
        try_requirements_met(job, &self.context(&inputs))
    }

    /// Every catalog job the player may take
    ///
    /// Despite the name, the result holds the *allowed* jobs.
    pub fn get_disallowed_jobs(&self, session: &PlayerSession) -> BTreeSet<JobId> {
        let inputs = self.gather(session);
        let ctx = self.context(&inputs);

        self.catalog
            .jobs
            .iter()
            .filter(|job| {
                job.requirements
                    .iter()
                    .flatten()
                    .all(|requirement| requirement.is_met(&ctx))
            })
            .map(|job| job.id.clone())
            .collect()
    }

    /// Drop every job the player may not take. Order is not preserved.
    ///
    /// Does nothing if the user has no session.
    pub fn remove_disallowed_jobs(&self, user_id: &UserId, jobs: &mut Vec<JobId>) {
        let Some(session) = self.host.sessions.session(user_id) else {
            return;
        };

        let inputs = self.gather(&session);
        let ctx = self.context(&inputs);

        let mut i = 0;
        while i < jobs.len() {
            let allowed = self
                .catalog
                .job(&jobs[i])
                .is_none_or(|job| try_requirements_met(job, &ctx));
            if allowed {
                i += 1;
            } else {
                jobs.swap_remove(i);
            }
        }
    }

    /// Why the player may not take the job. Empty when allowed.
    pub fn job_denial_reasons(&self, session: &PlayerSession, job_id: &JobId) -> Vec<ReasonCode> {
        let Some(job) = self.restricted_job(job_id) else {
            return Vec::new();
        };

        let inputs = self.gather(session);
        requirement_failures(job, &self.context(&inputs))
    }

    fn restricted_job(&self, job_id: &JobId) -> Option<&JobPrototype> {
        self.catalog.job(job_id).filter(|job| job.is_restricted())
    }

    fn gather(&self, session: &PlayerSession) -> PlayerInputs {
        let play_times = if self.catalog.service.role_timers {
            self.tracking
                .try_get_tracker_times(&session.user_id)
                .unwrap_or_else(|| {
                    error!(user_id = %session.user_id, "Unable to get play time snapshot, assuming none");
                    TrackerTimes::new()
                })
        } else {
            TrackerTimes::new()
        };

        let species = self
            .host
            .preferences
            .selected_character(&session.user_id)
            .map(|profile| profile.species)
            .unwrap_or_default();

        PlayerInputs {
            play_times,
            whitelisted: session.whitelisted,
            species,
        }
    }

    fn context<'a>(&'a self, inputs: &'a PlayerInputs) -> RequirementContext<'a> {
        RequirementContext {
            play_times: &inputs.play_times,
            role_timers: self.catalog.service.role_timers,
            whitelisted: inputs.whitelisted,
            species: &inputs.species,
            catalog: &self.catalog,
        }
    }

    fn refresh(&self, user_id: &UserId) {
        self.tracking.queue_refresh_trackers(user_id);
    }
}

impl TrackerCalculator for JobEligibility {
    fn calc_trackers(&self, user_id: &UserId, trackers: &mut BTreeSet<TrackerId>) {
        if let Some(session) = self.host.sessions.session(user_id) {
            trackers.extend(self.determine_trackers(&session));
        }
    }
}

impl LifecycleObserver for JobEligibility {
    fn on_event(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::RoundRestartCleanup => self.tracking.save(),
            LifecycleEvent::PlayerAttached { user_id, .. }
            | LifecycleEvent::PlayerDetached { user_id, .. }
            | LifecycleEvent::PlayerAfk { user_id }
            | LifecycleEvent::PlayerUnAfk { user_id }
            | LifecycleEvent::AdminPermissionsChanged { user_id } => self.refresh(user_id),
            LifecycleEvent::RoleAdded { mind } | LifecycleEvent::RoleRemoved { mind } => {
                if let Some(user_id) = self.host.minds.user_of(*mind) {
                    self.refresh(&user_id);
                }
            }
            LifecycleEvent::MobStateChanged { entity, .. } => {
                if let Some(user_id) = self.host.entities.controlling_user(*entity) {
                    self.refresh(&user_id);
                }
            }
            LifecycleEvent::PlayerJoinedLobby { user_id } => {
                self.refresh(user_id);
                self.tracking.queue_send_timers(user_id);
                self.tracking.queue_send_whitelist(user_id);
            }
        }
    }
}

impl std::fmt::Debug for JobEligibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobEligibility")
            .field("jobs", &self.catalog.jobs.len())
            .field("role_timers", &self.catalog.service.role_timers)
            .finish_non_exhaustive()
    }
}

/// Proof of [`JobEligibility::register`]. Call [`Registration::release`] to undo it.
#[must_use = "the evaluator stays registered until released"]
pub struct Registration {
    bus: LifecycleBus,
    subscription: SubscriptionId,
    tracking: Arc<dyn TrackingService>,
    calculator: CalculatorId,
}

impl Registration {
    /// Unsubscribe from the bus and remove the tracker calculator
    pub fn release(self) {
        self.bus.unsubscribe(self.subscription);
        self.tracking.remove_calculator(self.calculator);
        debug!("Job eligibility released");
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("subscription", &self.subscription)
            .field("calculator", &self.calculator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playtime_api::MobState;
    use playtime_config::{JobRequirement, ServiceConfig};
    use playtime_host_api::{CharacterProfile, HeldRole, MockWorld, SessionRegistry};
    use playtime_util::EntityId;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Tracking service that records calls and serves fixed snapshots
    #[derive(Default)]
    struct FakeTracking {
        times: Mutex<HashMap<UserId, TrackerTimes>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTracking {
        fn set_times(&self, user_id: UserId, entries: &[(&str, u64)]) {
            let times = entries
                .iter()
                .map(|(t, h)| (TrackerId::new(*t), Duration::from_secs(h * 3600)))
                .collect();
            self.times.lock().unwrap().insert(user_id, times);
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TrackingService for FakeTracking {
        fn queue_refresh_trackers(&self, user_id: &UserId) {
            self.record(format!("refresh {}", user_id));
        }
        fn queue_send_timers(&self, user_id: &UserId) {
            self.record(format!("timers {}", user_id));
        }
        fn queue_send_whitelist(&self, user_id: &UserId) {
            self.record(format!("whitelist {}", user_id));
        }
        fn save(&self) {
            self.record("save".into());
        }
        fn try_get_tracker_times(&self, user_id: &UserId) -> Option<TrackerTimes> {
            self.times.lock().unwrap().get(user_id).cloned()
        }
        fn add_calculator(&self, _calculator: Weak<dyn TrackerCalculator>) -> CalculatorId {
            CalculatorId(1)
        }
        fn remove_calculator(&self, _id: CalculatorId) -> bool {
            true
        }
    }

    fn catalog(role_timers: bool) -> Catalog {
        Catalog {
            service: ServiceConfig {
                role_timers,
                ..ServiceConfig::default()
            },
            departments: vec![],
            jobs: vec![
                JobPrototype::new("captain", "Captain")
                    .with_tracker("JobCaptain")
                    .with_requirements(vec![JobRequirement::OverallPlaytime {
                        time: Duration::from_secs(10 * 3600),
                        inverted: false,
                    }]),
                JobPrototype::new("visitor", "Visitor").with_requirements(vec![]),
                JobPrototype::new("passenger", "Passenger"),
                JobPrototype::new("blueshield", "Blueshield")
                    .with_requirements(vec![JobRequirement::Whitelist]),
            ],
        }
    }

    struct Fixture {
        world: Arc<MockWorld>,
        tracking: Arc<FakeTracking>,
        eligibility: JobEligibility,
    }

    fn fixture(role_timers: bool) -> Fixture {
        let world = Arc::new(MockWorld::new());
        let tracking = Arc::new(FakeTracking::default());
        let eligibility = JobEligibility::new(
            Arc::new(catalog(role_timers)),
            tracking.clone(),
            HostServices::from_host(world.clone()),
        );
        Fixture {
            world,
            tracking,
            eligibility,
        }
    }

    fn living_player(world: &MockWorld, entity: u64) -> PlayerSession {
        let user = UserId::new();
        world.connect(user, "Urist", false);
        world.attach(&user, EntityId::new(entity));
        world.set_mob_state(EntityId::new(entity), MobState::Alive);
        world.session(&user).unwrap()
    }

    fn names(trackers: &BTreeSet<TrackerId>) -> Vec<&str> {
        trackers.iter().map(|t| t.as_str()).collect()
    }

    #[test]
    fn test_afk_accrues_nothing() {
        let f = fixture(true);
        let session = living_player(&f.world, 1);
        f.world.set_admin(session.user_id, true);
        f.world.set_afk(session.user_id, true);

        assert!(f.eligibility.determine_trackers(&session).is_empty());
    }

    #[test]
    fn test_admin_accrues_admin_and_overall_only() {
        let f = fixture(true);
        let session = living_player(&f.world, 1);
        f.world.add_role(session.user_id, HeldRole::new("captain", Some(TrackerId::new("JobCaptain"))));
        f.world.set_admin(session.user_id, true);

        assert_eq!(names(&f.eligibility.determine_trackers(&session)), vec!["admin", "overall"]);

        // Admins accrue even without a body.
        f.world.detach(&session.user_id);
        let detached = f.world.session(&session.user_id).unwrap();
        assert_eq!(f.eligibility.determine_trackers(&detached).len(), 2);
    }

    #[test]
    fn test_dead_or_disembodied_accrues_nothing() {
        let f = fixture(true);
        let session = living_player(&f.world, 1);

        f.world.set_mob_state(EntityId::new(1), MobState::Dead);
        assert!(f.eligibility.determine_trackers(&session).is_empty());

        f.world.remove_mob_state(EntityId::new(1));
        assert!(f.eligibility.determine_trackers(&session).is_empty());

        let ghost = PlayerSession::new(UserId::new(), "Ghost");
        assert!(f.eligibility.determine_trackers(&ghost).is_empty());
    }

    #[test]
    fn test_critical_still_accrues() {
        let f = fixture(true);
        let session = living_player(&f.world, 1);
        f.world.set_mob_state(EntityId::new(1), MobState::Critical);

        assert_eq!(names(&f.eligibility.determine_trackers(&session)), vec!["overall"]);
    }

    #[test]
    fn test_living_accrues_role_trackers() {
        let f = fixture(true);
        let session = living_player(&f.world, 1);
        f.world.add_role(session.user_id, HeldRole::new("captain", Some(TrackerId::new("JobCaptain"))));
        f.world.add_role(session.user_id, HeldRole::new("traitor", None));
        f.world.add_role(session.user_id, HeldRole::new("odd", Some(TrackerId::new("  "))));

        assert_eq!(
            names(&f.eligibility.determine_trackers(&session)),
            vec!["JobCaptain", "overall"]
        );
    }

    #[test]
    fn test_role_order_does_not_matter() {
        let f = fixture(true);
        let roles = [
            HeldRole::new("captain", Some(TrackerId::new("JobCaptain"))),
            HeldRole::new("passenger", Some(TrackerId::new("JobPassenger"))),
            HeldRole::new("traitor", None),
        ];

        let first = living_player(&f.world, 1);
        for role in roles.iter() {
            f.world.add_role(first.user_id, role.clone());
        }
        let second = living_player(&f.world, 2);
        for role in roles.iter().rev() {
            f.world.add_role(second.user_id, role.clone());
        }

        let expected = f.eligibility.determine_trackers(&first);
        assert_eq!(f.eligibility.determine_trackers(&second), expected);
        assert_eq!(names(&expected), vec!["JobCaptain", "JobPassenger", "overall"]);
    }

    #[test]
    fn test_captain_example() {
        let f = fixture(true);
        let session = living_player(&f.world, 1);
        let captain = JobId::new("captain");

        f.tracking.set_times(session.user_id, &[("overall", 5)]);
        assert!(!f.eligibility.is_allowed(&session, &captain));

        f.tracking.set_times(session.user_id, &[("overall", 15)]);
        assert!(f.eligibility.is_allowed(&session, &captain));
    }

    #[test]
    fn test_visitor_and_unknown_jobs_always_allowed() {
        let f = fixture(true);
        let session = living_player(&f.world, 1);

        // No snapshot at all for this player.
        assert!(f.eligibility.is_allowed(&session, &JobId::new("visitor")));
        assert!(f.eligibility.is_allowed(&session, &JobId::new("passenger")));
        assert!(f.eligibility.is_allowed(&session, &JobId::new("does-not-exist")));
    }

    #[test]
    fn test_missing_snapshot_equals_zero_time() {
        let f = fixture(true);
        let missing = living_player(&f.world, 1);
        let zero = living_player(&f.world, 2);
        f.tracking.set_times(zero.user_id, &[]);

        for job in &f.eligibility.catalog().jobs {
            assert_eq!(
                f.eligibility.is_allowed(&missing, &job.id),
                f.eligibility.is_allowed(&zero, &job.id),
                "job {}",
                job.id
            );
        }
        assert!(!f.eligibility.is_allowed(&missing, &JobId::new("captain")));
    }

    #[test]
    fn test_role_timers_disabled_skips_snapshot() {
        let f = fixture(false);
        let session = living_player(&f.world, 1);

        assert!(f.eligibility.is_allowed(&session, &JobId::new("captain")));
        assert!(!f.eligibility.is_allowed(&session, &JobId::new("blueshield")));
    }

    #[test]
    fn test_get_disallowed_jobs_returns_allowed_jobs() {
        let f = fixture(true);
        let session = living_player(&f.world, 1);
        f.tracking.set_times(session.user_id, &[("overall", 5)]);

        let result = f.eligibility.get_disallowed_jobs(&session);
        let ids: Vec<&str> = result.iter().map(|j| j.as_str()).collect();
        assert_eq!(ids, vec!["passenger", "visitor"]);

        let filtered: BTreeSet<JobId> = f
            .eligibility
            .catalog()
            .jobs
            .iter()
            .filter(|job| f.eligibility.is_allowed(&session, &job.id))
            .map(|job| job.id.clone())
            .collect();
        assert_eq!(result, filtered);
    }

    #[test]
    fn test_remove_disallowed_jobs() {
        let f = fixture(true);
        let session = living_player(&f.world, 1);
        f.tracking.set_times(session.user_id, &[("overall", 5)]);

        let mut jobs = vec![
            JobId::new("captain"),
            JobId::new("passenger"),
            JobId::new("blueshield"),
            JobId::new("mystery"),
        ];
        f.eligibility.remove_disallowed_jobs(&session.user_id, &mut jobs);

        jobs.sort();
        assert_eq!(jobs, vec![JobId::new("mystery"), JobId::new("passenger")]);
    }

    #[test]
    fn test_remove_disallowed_jobs_unknown_user_is_noop() {
        let f = fixture(true);
        let mut jobs = vec![JobId::new("captain"), JobId::new("blueshield")];
        f.eligibility.remove_disallowed_jobs(&UserId::new(), &mut jobs);
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn test_denial_reasons_match_is_allowed() {
        let f = fixture(true);
        let session = living_player(&f.world, 1);
        f.tracking.set_times(session.user_id, &[("overall", 5)]);

        for job in &f.eligibility.catalog().jobs {
            let reasons = f.eligibility.job_denial_reasons(&session, &job.id);
            assert_eq!(reasons.is_empty(), f.eligibility.is_allowed(&session, &job.id));
        }
        assert_eq!(
            f.eligibility.job_denial_reasons(&session, &JobId::new("blueshield")),
            vec![ReasonCode::NotWhitelisted]
        );
    }

    #[test]
    fn test_species_from_selected_character() {
        let world = Arc::new(MockWorld::new());
        let tracking = Arc::new(FakeTracking::default());
        let mut catalog = catalog(true);
        catalog.jobs.push(
            JobPrototype::new("botanist", "Botanist").with_requirements(vec![JobRequirement::Species {
                species: ["Diona".to_string()].into_iter().collect(),
                inverted: true,
            }]),
        );
        let eligibility =
            JobEligibility::new(Arc::new(catalog), tracking, HostServices::from_host(world.clone()));

        let session = living_player(&world, 1);
        let botanist = JobId::new("botanist");
        assert!(eligibility.is_allowed(&session, &botanist));

        world.select_character(
            session.user_id,
            CharacterProfile {
                name: "Leafy".into(),
                species: "Diona".into(),
            },
        );
        assert!(!eligibility.is_allowed(&session, &botanist));
    }

    #[test]
    fn test_relays() {
        let f = fixture(true);
        let session = living_player(&f.world, 7);
        let user = session.user_id;
        let mind = f.world.add_role(user, HeldRole::new("captain", None));

        f.eligibility.on_event(&LifecycleEvent::PlayerAfk { user_id: user });
        f.eligibility.on_event(&LifecycleEvent::RoleAdded { mind });
        f.eligibility.on_event(&LifecycleEvent::MobStateChanged {
            entity: EntityId::new(7),
            old_state: MobState::Alive,
            new_state: MobState::Dead,
        });
        f.eligibility.on_event(&LifecycleEvent::PlayerJoinedLobby { user_id: user });
        f.eligibility.on_event(&LifecycleEvent::RoundRestartCleanup);

        let expected = vec![
            format!("refresh {}", user),
            format!("refresh {}", user),
            format!("refresh {}", user),
            format!("refresh {}", user),
            format!("timers {}", user),
            format!("whitelist {}", user),
            "save".to_string(),
        ];
        assert_eq!(f.tracking.calls(), expected);
    }

    #[test]
    fn test_relays_without_resolution_are_noops() {
        let f = fixture(true);
        let orphan_mind = f.world.add_role(UserId::new(), HeldRole::new("captain", None));

        f.eligibility.on_event(&LifecycleEvent::RoleRemoved { mind: orphan_mind });
        f.eligibility.on_event(&LifecycleEvent::MobStateChanged {
            entity: EntityId::new(99),
            old_state: MobState::Alive,
            new_state: MobState::Critical,
        });

        assert!(f.tracking.calls().is_empty());
    }
}
