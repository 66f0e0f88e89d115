//! Explicit lifecycle event registration

use playtime_api::LifecycleEvent;
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Something that reacts to engine lifecycle events
pub trait LifecycleObserver: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}

/// Handle returned by [`LifecycleBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct BusState {
    next_id: u64,
    observers: Vec<(SubscriptionId, Arc<dyn LifecycleObserver>)>,
}

/// Delivers lifecycle events to observers in subscription order
///
/// Cloning yields another handle to the same set of observers.
#[derive(Clone, Default)]
pub struct LifecycleBus {
    state: Arc<Mutex<BusState>>,
}

impl LifecycleBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut BusState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn subscribe(&self, observer: Arc<dyn LifecycleObserver>) -> SubscriptionId {
        self.with_state(|s| {
            s.next_id += 1;
            let id = SubscriptionId(s.next_id);
            s.observers.push((id, observer));
            id
        })
    }

    /// Remove an observer. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.with_state(|s| {
            let before = s.observers.len();
            s.observers.retain(|(sub, _)| *sub != id);
            s.observers.len() != before
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.with_state(|s| s.observers.len())
    }

    /// Deliver an event to every observer
    pub fn publish(&self, event: &LifecycleEvent) {
        // Observers may subscribe or unsubscribe from inside on_event.
        let observers: Vec<_> = self.with_state(|s| s.observers.iter().map(|(_, o)| o.clone()).collect());

        trace!(event = event.name(), observers = observers.len(), "Publishing lifecycle event");
        for observer in observers {
            observer.on_event(event);
        }
    }
}

impl std::fmt::Debug for LifecycleBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
