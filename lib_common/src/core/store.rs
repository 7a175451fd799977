//! Storage contract for processed records, plus the in-memory engine.
//!
//! The fan-out pipeline only depends on this trait; which engine sits behind
//! it (PostgreSQL in production, memory in tests and dummy mode) is a wiring
//! decision made at server startup.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::model::{ProcessedRecord, RecordDraft};

/// Custom error types for record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(i32),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Durable table of processed records.
///
/// Engines guarantee that operations on a single id do not interleave; an
/// update racing a delete on the same id resolves to one of them winning,
/// never to a corrupt row.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persists a validated record and assigns its id. Ids are never reused.
    async fn create(&self, draft: &RecordDraft) -> Result<ProcessedRecord, StoreError>;

    /// Fetches a record by id.
    async fn get(&self, id: i32) -> Result<ProcessedRecord, StoreError>;

    /// Returns all stored records.
    async fn list(&self) -> Result<Vec<ProcessedRecord>, StoreError>;

    /// Replaces every field except the id. Returns the updated record.
    async fn update(&self, id: i32, draft: &RecordDraft) -> Result<ProcessedRecord, StoreError>;

    /// Removes the record permanently and returns it. No tombstone remains.
    async fn delete(&self, id: i32) -> Result<ProcessedRecord, StoreError>;
}

/// Non-durable engine backed by a `BTreeMap`.
///
/// Used by the test suites and by the server's `--memory-store` mode. The id
/// counter only moves forward, so deleted ids are never handed out again.
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

struct MemoryInner {
    records: BTreeMap<i32, ProcessedRecord>,
    next_id: i32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                records: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, draft: &RecordDraft) -> Result<ProcessedRecord, StoreError> {
        let mut inner = self.inner.lock().expect("MemoryStore lock poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        let record = ProcessedRecord::from_draft(id, draft);
        inner.records.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: i32) -> Result<ProcessedRecord, StoreError> {
        let inner = self.inner.lock().expect("MemoryStore lock poisoned");
        inner.records.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<ProcessedRecord>, StoreError> {
        let inner = self.inner.lock().expect("MemoryStore lock poisoned");
        Ok(inner.records.values().cloned().collect())
    }

    async fn update(&self, id: i32, draft: &RecordDraft) -> Result<ProcessedRecord, StoreError> {
        let mut inner = self.inner.lock().expect("MemoryStore lock poisoned");
        match inner.records.get_mut(&id) {
            Some(existing) => {
                *existing = ProcessedRecord::from_draft(id, draft);
                Ok(existing.clone())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn delete(&self, id: i32) -> Result<ProcessedRecord, StoreError> {
        let mut inner = self.inner.lock().expect("MemoryStore lock poisoned");
        inner.records.remove(&id).ok_or(StoreError::NotFound(id))
    }
}
