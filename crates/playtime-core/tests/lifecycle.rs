//! End-to-end tests: world events flow through the bus into real tracking

use playtime_api::{ClientMessage, LifecycleEvent, MobState};
use playtime_config::parse_config;
use playtime_core::{JobEligibility, LifecycleBus, PlayTimeManager, TrackingService};
use playtime_host_api::{HeldRole, HostServices, MockWorld, SessionRegistry};
use playtime_store::{SqliteStore, Store};
use playtime_util::{EntityId, JobId, MonotonicInstant, TrackerId, UserId};
use std::sync::Arc;
use std::time::Duration;

const CATALOG: &str = r#"
config_version = 1

[[departments]]
id = "command"
jobs = ["captain"]

[[jobs]]
id = "captain"
name = "Captain"
tracker = "JobCaptain"

[[jobs.requirements]]
type = "overall_playtime"
hours = 10

[[jobs]]
id = "passenger"
name = "Passenger"
tracker = "JobPassenger"
"#;

struct Harness {
    world: Arc<MockWorld>,
    store: Arc<SqliteStore>,
    manager: Arc<PlayTimeManager>,
    eligibility: Arc<JobEligibility>,
    bus: LifecycleBus,
    inbox: tokio::sync::mpsc::UnboundedReceiver<ClientMessage>,
}

fn harness_with_store(store: Arc<SqliteStore>) -> Harness {
    let catalog = Arc::new(parse_config(CATALOG).unwrap());
    let world = Arc::new(MockWorld::new());
    let (manager, inbox) = PlayTimeManager::new(store.clone(), Duration::from_secs(3600));
    let manager = Arc::new(manager);
    let eligibility = Arc::new(JobEligibility::new(
        catalog,
        manager.clone(),
        HostServices::from_host(world.clone()),
    ));
    let bus = LifecycleBus::new();

    Harness {
        world,
        store,
        manager,
        eligibility,
        bus,
        inbox,
    }
}

fn harness() -> Harness {
    harness_with_store(Arc::new(SqliteStore::in_memory().unwrap()))
}

/// Connect a player, give them a living body and the passenger job
fn spawn_player(h: &Harness, entity: u64) -> UserId {
    let user = UserId::new();
    let session = h.world.connect(user, "Urist", false);
    h.manager.load_player(&session).unwrap();

    h.world.attach(&user, EntityId::new(entity));
    h.world.set_mob_state(EntityId::new(entity), MobState::Alive);
    h.bus.publish(&LifecycleEvent::PlayerAttached {
        user_id: user,
        entity: EntityId::new(entity),
    });

    let mind = h.world.add_role(user, HeldRole::new("passenger", Some(TrackerId::new("JobPassenger"))));
    h.bus.publish(&LifecycleEvent::RoleAdded { mind });
    user
}

fn tracker(name: &str) -> TrackerId {
    TrackerId::new(name)
}

#[test]
fn test_living_player_accrues_overall_and_role_time() {
    let h = harness();
    let _registration = h.eligibility.register(&h.bus);
    let user = spawn_player(&h, 1);

    let t0 = MonotonicInstant::now();
    h.manager.update(t0);
    h.manager.update(t0 + Duration::from_secs(120));

    let times = h.manager.try_get_tracker_times(&user).unwrap();
    assert_eq!(times[&tracker("overall")], Duration::from_secs(120));
    assert_eq!(times[&tracker("JobPassenger")], Duration::from_secs(120));
}

#[test]
fn test_death_stops_accrual() {
    let h = harness();
    let _registration = h.eligibility.register(&h.bus);
    let user = spawn_player(&h, 1);

    let t0 = MonotonicInstant::now();
    h.manager.update(t0);

    h.world.set_mob_state(EntityId::new(1), MobState::Dead);
    h.bus.publish(&LifecycleEvent::MobStateChanged {
        entity: EntityId::new(1),
        old_state: MobState::Alive,
        new_state: MobState::Dead,
    });
    h.manager.update(t0 + Duration::from_secs(60));
    h.manager.update(t0 + Duration::from_secs(600));

    let times = h.manager.try_get_tracker_times(&user).unwrap();
    assert_eq!(times[&tracker("overall")], Duration::from_secs(60));
    assert!(h.manager.active_trackers(&user).unwrap().is_empty());
}

#[test]
fn test_afk_then_back() {
    let h = harness();
    let _registration = h.eligibility.register(&h.bus);
    let user = spawn_player(&h, 1);

    let t0 = MonotonicInstant::now();
    h.manager.update(t0);

    h.world.set_afk(user, true);
    h.bus.publish(&LifecycleEvent::PlayerAfk { user_id: user });
    h.manager.update(t0 + Duration::from_secs(10));

    h.world.set_afk(user, false);
    h.bus.publish(&LifecycleEvent::PlayerUnAfk { user_id: user });
    h.manager.update(t0 + Duration::from_secs(100));
    h.manager.update(t0 + Duration::from_secs(130));

    let times = h.manager.try_get_tracker_times(&user).unwrap();
    assert_eq!(times[&tracker("overall")], Duration::from_secs(40));
}

#[test]
fn test_admin_accrues_admin_time() {
    let h = harness();
    let _registration = h.eligibility.register(&h.bus);
    let user = spawn_player(&h, 1);

    h.world.set_admin(user, true);
    h.bus.publish(&LifecycleEvent::AdminPermissionsChanged { user_id: user });

    let t0 = MonotonicInstant::now();
    h.manager.update(t0);
    h.manager.update(t0 + Duration::from_secs(30));

    let times = h.manager.try_get_tracker_times(&user).unwrap();
    assert_eq!(times[&tracker("admin")], Duration::from_secs(30));
    assert!(!times.contains_key(&tracker("JobPassenger")));
}

#[test]
fn test_captain_unlocks_after_ten_hours() {
    let h = harness();
    let _registration = h.eligibility.register(&h.bus);
    let user = spawn_player(&h, 1);
    let captain = JobId::new("captain");

    let t0 = MonotonicInstant::now();
    h.manager.update(t0);

    let session = h.world.session(&user).unwrap();
    h.manager.update(t0 + Duration::from_secs(5 * 3600));
    assert!(!h.eligibility.is_allowed(&session, &captain));
    assert!(!h.eligibility.job_denial_reasons(&session, &captain).is_empty());

    h.manager.update(t0 + Duration::from_secs(10 * 3600));
    assert!(h.eligibility.is_allowed(&session, &captain));
    assert!(h.eligibility.get_disallowed_jobs(&session).contains(&captain));
}

#[test]
fn test_unloaded_player_fails_to_zero_time() {
    let h = harness();
    let _registration = h.eligibility.register(&h.bus);

    let user = UserId::new();
    let session = h.world.connect(user, "Urist", false);

    assert!(h.manager.try_get_tracker_times(&user).is_none());
    assert!(!h.eligibility.is_allowed(&session, &JobId::new("captain")));
    assert!(h.eligibility.is_allowed(&session, &JobId::new("passenger")));
}

#[test]
fn test_lobby_join_sends_timers_and_whitelist() {
    let mut h = harness();
    let _registration = h.eligibility.register(&h.bus);
    let user = spawn_player(&h, 1);

    h.bus.publish(&LifecycleEvent::PlayerJoinedLobby { user_id: user });
    h.manager.update(MonotonicInstant::now());

    let first = h.inbox.try_recv().unwrap();
    assert!(matches!(first, ClientMessage::PlayTimes { user_id, .. } if user_id == user));
    let second = h.inbox.try_recv().unwrap();
    assert_eq!(
        second,
        ClientMessage::Whitelist {
            user_id: user,
            whitelisted: false,
        }
    );
}

#[test]
fn test_round_restart_saves() {
    let h = harness();
    let _registration = h.eligibility.register(&h.bus);
    let user = spawn_player(&h, 1);

    let t0 = MonotonicInstant::now();
    h.manager.update(t0);
    h.manager.update(t0 + Duration::from_secs(75));
    h.bus.publish(&LifecycleEvent::RoundRestartCleanup);

    let persisted = h.store.get_play_times(&user).unwrap();
    assert_eq!(persisted[&tracker("overall")], Duration::from_secs(75));
}

#[test]
fn test_release_deregisters() {
    let h = harness();
    let registration = h.eligibility.register(&h.bus);
    assert_eq!(h.bus.subscriber_count(), 1);
    registration.release();
    assert_eq!(h.bus.subscriber_count(), 0);

    let user = spawn_player(&h, 1);
    let t0 = MonotonicInstant::now();
    h.manager.update(t0);
    h.manager.update(t0 + Duration::from_secs(60));

    // Load still queued a refresh, but nothing computes trackers any more.
    assert!(h.manager.active_trackers(&user).unwrap().is_empty());
    assert!(h.manager.try_get_tracker_times(&user).unwrap().is_empty());
}

#[test]
fn test_totals_survive_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("playtime.db");
    let user;

    {
        let h = harness_with_store(Arc::new(SqliteStore::open(&path).unwrap()));
        let _registration = h.eligibility.register(&h.bus);
        user = spawn_player(&h, 1);

        let t0 = MonotonicInstant::now();
        h.manager.update(t0);
        h.manager.update(t0 + Duration::from_secs(11 * 3600));
        h.manager.unload_player(&user);
    }

    let h = harness_with_store(Arc::new(SqliteStore::open(&path).unwrap()));
    let _registration = h.eligibility.register(&h.bus);
    let session = h.world.connect(user, "Urist", false);
    h.manager.load_player(&session).unwrap();

    assert!(h.eligibility.is_allowed(&session, &JobId::new("captain")));
}
