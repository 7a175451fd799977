//! # Core Engine Module
//!
//! The heart of the telemetry hub. It aggregates the components the
//! ingestion-and-fan-out pipeline is built from:
//!
//! - **`model`**: The `ProcessedRecord` data model, its wire shape, and
//!   timestamp validation.
//!
//! - **`registry`**: The per-agent subscription registry. Tracks the live
//!   listeners for each agent and hands out snapshots to the fan-out path.
//!
//! - **`dispatcher`**: The zero-copy broadcaster. Pushes each newly stored
//!   record to all listeners currently subscribed to its agent.
//!
//! - **`ingest`**: The write path. Validates incoming items, commits them
//!   through the record store, then publishes them.
//!
//! - **`store`**: The `RecordStore` contract and the in-memory engine. The
//!   PostgreSQL engine lives in `connections`.
//!
//! By declaring and re-exporting these components, the `core` module provides
//! a unified public API for the `servers` crate to build its HTTP and
//! WebSocket surface on.

/// The telemetry record model and wire-level validation.
pub mod model;
/// The per-agent registry of live listeners.
pub mod registry;
/// The zero-copy broadcaster for newly stored records.
pub mod dispatcher;
/// The validate, persist, publish write path.
pub mod ingest;
/// The record store contract and the in-memory engine.
pub mod store;

// --- Public API Re-exports ---
// Make the primary structs from the core modules directly accessible.
pub use dispatcher::FanoutDispatcher;
pub use ingest::{IngestError, IngestService};
pub use model::{Motion, NewRecord, Position, ProcessedRecord, RecordDraft, ValidationError};
pub use registry::{ListenerId, SubscriptionRegistry};
pub use store::{MemoryStore, RecordStore, StoreError};
