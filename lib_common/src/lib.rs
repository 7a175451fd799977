// Declare the modules to re-export
#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "connections")]
pub mod connections;

// Re-export the working set
#[cfg(feature = "core")]
pub use crate::core::dispatcher::*;
#[cfg(feature = "core")]
pub use crate::core::ingest::*;
#[cfg(feature = "core")]
pub use crate::core::model::*;
#[cfg(feature = "core")]
pub use crate::core::registry::*;
#[cfg(feature = "core")]
pub use crate::core::store::*;
#[cfg(feature = "connections")]
pub use crate::connections::db_postgres::*;
