//! Per-agent subscription registry.
//!
//! Owns the set of live listeners for each agent. A listener is added when
//! its connection opens and removed when that connection closes, normally or
//! abnormally; nothing else mutates the set. Reads hand out a snapshot, so
//! the fan-out path never iterates a set that another task is mutating.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::core::model::ProcessedRecord;

/// Identifies one live listener for the lifetime of the process.
pub type ListenerId = usize;

/// The sending half of a listener's delivery channel. Records are shared
/// across the fan-out behind an `Arc`, not cloned per listener.
pub type ListenerSender = mpsc::UnboundedSender<Arc<ProcessedRecord>>;

/// The receiving half, owned by the listener's connection task.
pub type ListenerReceiver = mpsc::UnboundedReceiver<Arc<ProcessedRecord>>;

static NEXT_LISTENER_ID: AtomicUsize = AtomicUsize::new(1);

/// Registry of live listeners, keyed by agent id.
pub struct SubscriptionRegistry {
    // Map of agent_id -> listeners currently bound to that agent
    subscriptions: Mutex<HashMap<i32, HashMap<ListenerId, ListenerSender>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a new listener under `agent_id` and returns its id together
    /// with the receiving half of its delivery channel. The registry never
    /// rejects a subscription; capacity limits belong to the caller.
    pub fn subscribe(&self, agent_id: i32) -> (ListenerId, ListenerReceiver) {
        let listener_id = NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut subs = self.subscriptions.lock().expect("Registry lock poisoned");
        subs.entry(agent_id).or_default().insert(listener_id, tx);
        log::info!("Listener {} subscribed to agent {}", listener_id, agent_id);

        (listener_id, rx)
    }

    /// Removes a listener from the set for `agent_id`.
    ///
    /// A disconnect may race with a cleanup that already ran, so removing an
    /// absent listener is a no-op, not an error.
    pub fn unsubscribe(&self, agent_id: i32, listener_id: ListenerId) {
        let mut subs = self.subscriptions.lock().expect("Registry lock poisoned");
        if let Some(listeners) = subs.get_mut(&agent_id) {
            if listeners.remove(&listener_id).is_some() {
                log::info!("Listener {} unsubscribed from agent {}", listener_id, agent_id);
            }
            if listeners.is_empty() {
                subs.remove(&agent_id);
            }
        }
    }

    /// Snapshot of the current listeners for `agent_id`, empty if none.
    ///
    /// The returned handles stay valid to iterate while other tasks
    /// subscribe and unsubscribe concurrently.
    pub fn listeners_for(&self, agent_id: i32) -> Vec<(ListenerId, ListenerSender)> {
        let subs = self.subscriptions.lock().expect("Registry lock poisoned");
        subs.get(&agent_id)
            .map(|listeners| listeners.iter().map(|(id, tx)| (*id, tx.clone())).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Motion, Position};

    fn record(id: i32, agent_id: i32) -> ProcessedRecord {
        ProcessedRecord {
            id,
            agent_id,
            road_state: "dry".into(),
            motion: Motion { x: 0.0, y: 0.0, z: 0.0 },
            position: Position { latitude: 0.0, longitude: 0.0 },
            timestamp: chrono::NaiveDateTime::default(),
        }
    }

    #[test]
    fn subscribe_registers_listener() {
        let registry = SubscriptionRegistry::new();
        let (id, _rx) = registry.subscribe(7);

        let listeners = registry.listeners_for(7);
        assert_eq!(listeners.len(), 1);
        assert_eq!(listeners[0].0, id);
    }

    #[test]
    fn unknown_agent_has_no_listeners() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.listeners_for(42).is_empty());
    }

    #[test]
    fn unsubscribe_removes_listener() {
        let registry = SubscriptionRegistry::new();
        let (id, _rx) = registry.subscribe(7);
        registry.unsubscribe(7, id);
        assert!(registry.listeners_for(7).is_empty());
    }

    #[test]
    fn unsubscribe_absent_listener_is_noop() {
        let registry = SubscriptionRegistry::new();
        let (id, _rx) = registry.subscribe(7);
        registry.unsubscribe(7, id);
        // A disconnect racing with a cleanup that already ran.
        registry.unsubscribe(7, id);
        registry.unsubscribe(99, id);
    }

    #[test]
    fn listener_ids_are_unique_across_agents() {
        let registry = SubscriptionRegistry::new();
        let (a, _rx_a) = registry.subscribe(1);
        let (b, _rx_b) = registry.subscribe(1);
        let (c, _rx_c) = registry.subscribe(2);
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn snapshot_survives_concurrent_unsubscribe() {
        let registry = SubscriptionRegistry::new();
        let (id, mut rx) = registry.subscribe(7);

        let snapshot = registry.listeners_for(7);
        registry.unsubscribe(7, id);

        // The snapshot still holds a usable sender; iterating it after the
        // removal must not panic or corrupt anything.
        snapshot[0].1.send(Arc::new(record(1, 7))).unwrap();
        assert!(rx.try_recv().is_ok());
    }
}
