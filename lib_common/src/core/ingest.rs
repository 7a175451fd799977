//! Ingestion write path: validate, persist, then fan out.

use std::sync::Arc;

use thiserror::Error;

use crate::core::dispatcher::FanoutDispatcher;
use crate::core::model::{NewRecord, ProcessedRecord, ValidationError};
use crate::core::store::{RecordStore, StoreError};

/// Failure of a single batch item, tagged with its position in the batch.
///
/// Items before `index` were already committed and broadcast; there is no
/// batch-level rollback.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("item {index}: {source}")]
    Validation {
        index: usize,
        #[source]
        source: ValidationError,
    },
    #[error("item {index}: {source}")]
    Store {
        index: usize,
        #[source]
        source: StoreError,
    },
}

/// The write path of the pipeline. Every record enters the system through
/// here; reads, updates, and deletes talk to the store directly.
pub struct IngestService {
    store: Arc<dyn RecordStore>,
    dispatcher: Arc<FanoutDispatcher>,
}

impl IngestService {
    pub fn new(store: Arc<dyn RecordStore>, dispatcher: Arc<FanoutDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Processes a batch in arrival order, committing items one by one.
    ///
    /// The publish for an item happens strictly after its durable write, so
    /// a record is always retrievable by the time a listener sees it. A
    /// failure on item N surfaces to the caller with items 0..N already
    /// committed and broadcast.
    pub async fn ingest(&self, batch: Vec<NewRecord>) -> Result<Vec<ProcessedRecord>, IngestError> {
        let mut stored = Vec::with_capacity(batch.len());
        for (index, item) in batch.into_iter().enumerate() {
            let draft = item
                .into_draft()
                .map_err(|source| IngestError::Validation { index, source })?;
            let record = self
                .store
                .create(&draft)
                .await
                .map_err(|source| IngestError::Store { index, source })?;
            self.dispatcher.publish(&record);
            stored.push(record);
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Motion, Position};
    use crate::core::registry::SubscriptionRegistry;
    use crate::core::store::MemoryStore;

    fn service() -> (IngestService, Arc<SubscriptionRegistry>, Arc<dyn RecordStore>) {
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = Arc::new(FanoutDispatcher::new(registry.clone()));
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        (IngestService::new(store.clone(), dispatcher), registry, store)
    }

    fn item(agent_id: i32, road_state: &str, timestamp: &str) -> NewRecord {
        NewRecord {
            agent_id,
            road_state: road_state.into(),
            motion: Motion { x: 1.0, y: 2.0, z: 3.0 },
            position: Position { latitude: 10.5, longitude: 20.5 },
            timestamp: timestamp.into(),
        }
    }

    #[tokio::test]
    async fn stores_and_broadcasts_each_item_in_order() {
        let (service, registry, store) = service();
        let (_, mut rx) = registry.subscribe(7);

        let stored = service
            .ingest(vec![
                item(7, "dry", "2024-01-01T12:00:00"),
                item(7, "wet", "2024-01-01T12:00:01"),
            ])
            .await
            .unwrap();

        assert_eq!(stored.len(), 2);
        assert_eq!(rx.recv().await.unwrap().id, stored[0].id);
        assert_eq!(rx.recv().await.unwrap().id, stored[1].id);

        // Broadcast happened after the durable write: both are readable.
        assert_eq!(store.get(stored[0].id).await.unwrap().road_state, "dry");
        assert_eq!(store.get(stored[1].id).await.unwrap().road_state, "wet");
    }

    #[tokio::test]
    async fn invalid_timestamp_rejects_item_with_no_side_effects() {
        let (service, registry, store) = service();
        let (_, mut rx) = registry.subscribe(7);

        let err = service
            .ingest(vec![item(7, "dry", "not-a-date")])
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Validation { index: 0, .. }));
        assert!(store.list().await.unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failure_mid_batch_keeps_earlier_items() {
        let (service, registry, store) = service();
        let (_, mut rx) = registry.subscribe(7);

        let err = service
            .ingest(vec![
                item(7, "dry", "2024-01-01T12:00:00"),
                item(7, "wet", "not-a-date"),
                item(7, "icy", "2024-01-01T12:00:02"),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Validation { index: 1, .. }));

        // The first item committed and was broadcast; the rest never ran.
        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].road_state, "dry");
        assert_eq!(rx.recv().await.unwrap().road_state, "dry");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn round_trip_of_nested_shape() {
        let (service, _registry, store) = service();

        let stored = service
            .ingest(vec![item(7, "dry", "2024-01-01T00:00:00")])
            .await
            .unwrap();

        let fetched = store.get(stored[0].id).await.unwrap();
        assert_eq!(fetched.agent_id, 7);
        assert_eq!(fetched.motion, Motion { x: 1.0, y: 2.0, z: 3.0 });
        assert_eq!(fetched.position, Position { latitude: 10.5, longitude: 20.5 });
        assert_eq!(fetched.timestamp.to_string(), "2024-01-01 00:00:00");
    }
}
