//! Shared state handed to every HTTP and WebSocket handler.

use std::sync::Arc;

use lib_common::core::dispatcher::FanoutDispatcher;
use lib_common::core::ingest::IngestService;
use lib_common::core::registry::SubscriptionRegistry;
use lib_common::core::store::RecordStore;

/// Wires the registry, dispatcher, and ingestion service around whichever
/// record store the server was started with. Created once at startup and
/// torn down with the process.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SubscriptionRegistry>,
    pub ingest: Arc<IngestService>,
    pub store: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = Arc::new(FanoutDispatcher::new(registry.clone()));
        let ingest = Arc::new(IngestService::new(store.clone(), dispatcher));
        Self {
            registry,
            ingest,
            store,
        }
    }
}
