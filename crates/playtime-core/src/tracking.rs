//! Play-time tracking service
//!
//! The evaluator talks to the tracking service only through [`TrackingService`].
//! [`PlayTimeManager`] is the in-process implementation: it keeps per-player
//! tracker totals in memory, credits elapsed time to whichever trackers are
//! active, and writes dirty totals to the [`Store`].

use playtime_api::{ClientMessage, TrackerTimes};
use playtime_host_api::PlayerSession;
use playtime_store::{AuditEvent, AuditEventType, PlayTimeUpdate, Store, StoreResult};
use playtime_util::{MonotonicInstant, TrackerId, UserId};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Computes which trackers a player should currently accrue
pub trait TrackerCalculator: Send + Sync {
    /// Add the player's active trackers to `trackers`
    fn calc_trackers(&self, user_id: &UserId, trackers: &mut BTreeSet<TrackerId>);
}

/// Handle returned by [`TrackingService::add_calculator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CalculatorId(pub(crate) u64);

/// What the evaluator needs from the tracking service
pub trait TrackingService: Send + Sync {
    /// Recompute the player's active trackers on the next update
    fn queue_refresh_trackers(&self, user_id: &UserId);

    /// Push the player's tracker totals to their client on the next update
    fn queue_send_timers(&self, user_id: &UserId);

    /// Push the player's whitelist status to their client on the next update
    fn queue_send_whitelist(&self, user_id: &UserId);

    /// Persist every dirty total
    fn save(&self);

    /// Snapshot of the player's totals. `None` if the player is not loaded.
    fn try_get_tracker_times(&self, user_id: &UserId) -> Option<TrackerTimes>;

    /// Register a calculator. It is dropped silently once the calculator is gone.
    fn add_calculator(&self, calculator: Weak<dyn TrackerCalculator>) -> CalculatorId;

    /// Returns false if the calculator was not registered
    fn remove_calculator(&self, id: CalculatorId) -> bool;
}

#[derive(Debug)]
struct PlayerData {
    totals: TrackerTimes,
    active: BTreeSet<TrackerId>,
    dirty: BTreeSet<TrackerId>,
    last_update: MonotonicInstant,
    whitelisted: bool,
}

impl PlayerData {
    /// Credit time since the last update to the active trackers
    fn credit(&mut self, now: MonotonicInstant) {
        let elapsed = now.duration_since(self.last_update);
        self.last_update = now;
        if elapsed.is_zero() {
            return;
        }
        for tracker in &self.active {
            *self.totals.entry(tracker.clone()).or_default() += elapsed;
            self.dirty.insert(tracker.clone());
        }
    }

    fn take_dirty(&mut self, user_id: UserId) -> Vec<PlayTimeUpdate> {
        std::mem::take(&mut self.dirty)
            .into_iter()
            .map(|tracker| {
                let time = self.totals.get(&tracker).copied().unwrap_or_default();
                PlayTimeUpdate::new(user_id, tracker, time)
            })
            .collect()
    }
}

struct ManagerState {
    /// Latest instant passed to `update`
    now: MonotonicInstant,
    last_flush: MonotonicInstant,
    players: HashMap<UserId, PlayerData>,
    refresh_queue: Vec<UserId>,
    timers_queue: Vec<UserId>,
    whitelist_queue: Vec<UserId>,
    calculators: Vec<(CalculatorId, Weak<dyn TrackerCalculator>)>,
    next_calculator: u64,
}

impl ManagerState {
    fn credit_all(&mut self) {
        let now = self.now;
        for data in self.players.values_mut() {
            data.credit(now);
        }
    }

    fn enqueue(&mut self, queue: Queue, user_id: &UserId) {
        if !self.players.contains_key(user_id) {
            return;
        }
        let queue = match queue {
            Queue::Refresh => &mut self.refresh_queue,
            Queue::Timers => &mut self.timers_queue,
            Queue::Whitelist => &mut self.whitelist_queue,
        };
        if !queue.contains(user_id) {
            queue.push(*user_id);
        }
    }
}

#[derive(Clone, Copy)]
enum Queue {
    Refresh,
    Timers,
    Whitelist,
}

/// In-memory tracker totals backed by a [`Store`]
pub struct PlayTimeManager {
    store: Arc<dyn Store>,
    flush_interval: Duration,
    state: Mutex<ManagerState>,
    outbox: mpsc::UnboundedSender<ClientMessage>,
}

impl PlayTimeManager {
    /// Create a manager and the receiving end of its client message channel
    pub fn new(
        store: Arc<dyn Store>,
        flush_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let now = MonotonicInstant::now();

        let manager = Self {
            store,
            flush_interval,
            state: Mutex::new(ManagerState {
                now,
                last_flush: now,
                players: HashMap::new(),
                refresh_queue: Vec::new(),
                timers_queue: Vec::new(),
                whitelist_queue: Vec::new(),
                calculators: Vec::new(),
                next_calculator: 0,
            }),
            outbox,
        };

        (manager, inbox)
    }

    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Load a connecting player's persisted totals and queue a refresh
    ///
    /// Loading an already-loaded player only updates the whitelist flag.
    pub fn load_player(&self, session: &PlayerSession) -> StoreResult<()> {
        let user_id = session.user_id;

        {
            let mut state = self.state();
            if let Some(data) = state.players.get_mut(&user_id) {
                data.whitelisted = session.whitelisted;
                state.enqueue(Queue::Refresh, &user_id);
                return Ok(());
            }
        }

        let totals = self.store.get_play_times(&user_id)?;

        let mut state = self.state();
        let now = state.now;
        state.players.insert(
            user_id,
            PlayerData {
                totals,
                active: BTreeSet::new(),
                dirty: BTreeSet::new(),
                last_update: now,
                whitelisted: session.whitelisted,
            },
        );
        state.enqueue(Queue::Refresh, &user_id);
        drop(state);

        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::PlayerLoaded { user_id }));
        info!(user_id = %user_id, "Player loaded");
        Ok(())
    }

    /// Flush a disconnecting player's totals and forget them
    pub fn unload_player(&self, user_id: &UserId) {
        let mut state = self.state();
        let now = state.now;
        let Some(mut data) = state.players.remove(user_id) else {
            return;
        };
        state.refresh_queue.retain(|u| u != user_id);
        state.timers_queue.retain(|u| u != user_id);
        state.whitelist_queue.retain(|u| u != user_id);
        drop(state);

        data.credit(now);
        let updates = data.take_dirty(*user_id);
        if let Err(e) = self.store.save_play_times(&updates) {
            error!(user_id = %user_id, error = %e, "Failed to save play time on unload");
        }

        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::PlayerUnloaded { user_id: *user_id }));
        info!(user_id = %user_id, "Player unloaded");
    }

    pub fn is_loaded(&self, user_id: &UserId) -> bool {
        self.state().players.contains_key(user_id)
    }

    /// Trackers the player is currently accruing
    pub fn active_trackers(&self, user_id: &UserId) -> Option<BTreeSet<TrackerId>> {
        self.state().players.get(user_id).map(|d| d.active.clone())
    }

    /// Advance the clock: credit time, process refreshes, send queued messages
    pub fn update(&self, now: MonotonicInstant) {
        let (refresh, calculators) = {
            let mut state = self.state();
            state.now = now;

            if now.duration_since(state.last_flush) >= self.flush_interval {
                state.credit_all();
                state.last_flush = now;
                debug!(players = state.players.len(), "Periodic play time credit");
            }

            state.calculators.retain(|(_, c)| c.strong_count() > 0);
            let calculators: Vec<_> = state.calculators.iter().filter_map(|(_, c)| c.upgrade()).collect();
            (std::mem::take(&mut state.refresh_queue), calculators)
        };

        // Calculators query the host; run them without holding our lock.
        let computed: Vec<_> = refresh
            .into_iter()
            .map(|user_id| {
                let mut trackers = BTreeSet::new();
                for calculator in &calculators {
                    calculator.calc_trackers(&user_id, &mut trackers);
                }
                (user_id, trackers)
            })
            .collect();

        let mut state = self.state();
        for (user_id, trackers) in computed {
            let Some(data) = state.players.get_mut(&user_id) else {
                continue;
            };
            data.credit(now);
            if data.active != trackers {
                debug!(user_id = %user_id, trackers = ?trackers, "Active trackers changed");
            }
            data.active = trackers;
        }

        let mut messages = Vec::new();
        for user_id in std::mem::take(&mut state.timers_queue) {
            if let Some(data) = state.players.get_mut(&user_id) {
                data.credit(now);
                messages.push(ClientMessage::PlayTimes {
                    user_id,
                    trackers: data.totals.clone(),
                });
            }
        }
        for user_id in std::mem::take(&mut state.whitelist_queue) {
            if let Some(data) = state.players.get(&user_id) {
                messages.push(ClientMessage::Whitelist {
                    user_id,
                    whitelisted: data.whitelisted,
                });
            }
        }
        drop(state);

        for message in messages {
            if self.outbox.send(message).is_err() {
                debug!("Client message receiver dropped");
            }
        }
    }
}

impl TrackingService for PlayTimeManager {
    fn queue_refresh_trackers(&self, user_id: &UserId) {
        self.state().enqueue(Queue::Refresh, user_id);
    }

    fn queue_send_timers(&self, user_id: &UserId) {
        self.state().enqueue(Queue::Timers, user_id);
    }

    fn queue_send_whitelist(&self, user_id: &UserId) {
        self.state().enqueue(Queue::Whitelist, user_id);
    }

    fn save(&self) {
        let mut state = self.state();
        state.credit_all();

        let mut updates = Vec::new();
        let mut players = 0;
        for (user_id, data) in state.players.iter_mut() {
            let dirty = data.take_dirty(*user_id);
            if !dirty.is_empty() {
                players += 1;
                updates.extend(dirty);
            }
        }

        if updates.is_empty() {
            debug!("No play time to save");
            return;
        }

        match self.store.save_play_times(&updates) {
            Ok(()) => {
                let _ = self.store.append_audit(AuditEvent::new(AuditEventType::PlayTimeSaved {
                    players,
                    rows: updates.len(),
                }));
                info!(players, rows = updates.len(), "Play time saved");
            }
            Err(e) => {
                // Keep them dirty so the next save retries.
                for update in updates {
                    if let Some(data) = state.players.get_mut(&update.user_id) {
                        data.dirty.insert(update.tracker);
                    }
                }
                error!(error = %e, "Failed to save play time");
            }
        }
    }

    fn try_get_tracker_times(&self, user_id: &UserId) -> Option<TrackerTimes> {
        let mut state = self.state();
        let now = state.now;
        let data = state.players.get_mut(user_id)?;
        data.credit(now);
        Some(data.totals.clone())
    }

    fn add_calculator(&self, calculator: Weak<dyn TrackerCalculator>) -> CalculatorId {
        let mut state = self.state();
        state.next_calculator += 1;
        let id = CalculatorId(state.next_calculator);
        state.calculators.push((id, calculator));
        id
    }

    fn remove_calculator(&self, id: CalculatorId) -> bool {
        let mut state = self.state();
        let before = state.calculators.len();
        state.calculators.retain(|(c, _)| *c != id);
        state.calculators.len() != before
    }
}

impl std::fmt::Debug for PlayTimeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayTimeManager")
            .field("flush_interval", &self.flush_interval)
            .field("players", &self.state().players.len())
            .finish_non_exhaustive()
    }
}
