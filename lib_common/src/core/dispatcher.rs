//! # Zero-Copy Record Fan-out
//!
//! The `FanoutDispatcher` pushes every newly stored record to the listeners
//! currently subscribed to that record's agent.
//!
//! ## Core Design Principles:
//!
//! 1.  **Zero-Copy Fan-out**: The record is wrapped in an `Arc` once; each
//!     listener receives a new pointer to the same block of memory rather
//!     than its own clone of the payload.
//!
//! 2.  **Snapshot Iteration**: The listener set is snapshotted from the
//!     registry before any delivery starts, so subscribe/unsubscribe calls
//!     racing with the fan-out can never invalidate the iteration.
//!
//! 3.  **Failure Isolation**: Each per-listener delivery is independent. A
//!     dead listener is logged and dropped from the registry; the remaining
//!     deliveries proceed, and the originating write is never affected. The
//!     record is already durable by the time `publish` runs.
//!
//! Delivery is best-effort and at-most-once per listener per record: there
//! is no buffering, no replay, and no retry.

use std::sync::Arc;

use crate::core::model::ProcessedRecord;
use crate::core::registry::SubscriptionRegistry;

/// Broadcasts newly stored records to the live listeners of their agent.
pub struct FanoutDispatcher {
    registry: Arc<SubscriptionRegistry>,
}

impl FanoutDispatcher {
    /// Creates a dispatcher bound to the registry it reads listener sets from.
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }

    /// Delivers `record` to every listener currently subscribed to its agent.
    ///
    /// A listener whose receiving half is gone has disconnected; it is
    /// removed from the registry and skipped. Nothing here can fail or block
    /// the caller.
    pub fn publish(&self, record: &ProcessedRecord) {
        let listeners = self.registry.listeners_for(record.agent_id);
        if listeners.is_empty() {
            return;
        }

        let frame = Arc::new(record.clone());
        for (listener_id, sender) in listeners {
            if sender.send(Arc::clone(&frame)).is_err() {
                log::warn!(
                    "Listener {} for agent {} is gone, dropping it from the registry",
                    listener_id,
                    record.agent_id
                );
                self.registry.unsubscribe(record.agent_id, listener_id);
            }
        }
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
            motion: Motion { x: 1.0, y: 2.0, z: 3.0 },
            position: Position { latitude: 10.5, longitude: 20.5 },
            timestamp: chrono::NaiveDateTime::default(),
        }
    }

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = FanoutDispatcher::new(registry.clone());
        let (_, mut rx) = registry.subscribe(7);

        dispatcher.publish(&record(1, 7));
        dispatcher.publish(&record(2, 7));

        assert_eq!(rx.recv().await.unwrap().id, 1);
        assert_eq!(rx.recv().await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn only_matching_agent_receives() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = FanoutDispatcher::new(registry.clone());
        let (_, mut rx_a) = registry.subscribe(1);
        let (_, mut rx_b) = registry.subscribe(2);

        dispatcher.publish(&record(1, 1));

        assert_eq!(rx_a.recv().await.unwrap().id, 1);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_subscriber_gets_no_backlog() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = FanoutDispatcher::new(registry.clone());

        dispatcher.publish(&record(1, 7));
        let (_, mut rx) = registry.subscribe(7);

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_listener_does_not_block_the_rest() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = FanoutDispatcher::new(registry.clone());

        let (_dead_id, dead_rx) = registry.subscribe(7);
        let (_, mut live_rx) = registry.subscribe(7);
        drop(dead_rx);

        dispatcher.publish(&record(1, 7));

        assert_eq!(live_rx.recv().await.unwrap().id, 1);
        // The dead listener was purged during the fan-out.
        assert_eq!(registry.listeners_for(7).len(), 1);
    }

    #[tokio::test]
    async fn publish_with_no_listeners_is_silent() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = FanoutDispatcher::new(registry);
        dispatcher.publish(&record(1, 7));
    }
}
