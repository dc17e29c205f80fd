//! Durable backing stores for model records
//!
//! Every backend implements `save` as a compare-and-set on `version`: a record is
//! accepted only when its version is exactly one above the stored version (0 when the
//! id is absent). A stale writer gets `AppError::Conflict` and the stored row is left
//! untouched, so concurrent writers for the same id serialize and the loser is told.

pub mod factory;
pub mod memory;
pub mod sled_store;
pub mod sqlite_store;

pub use factory::{create_in_memory_store, create_store};
pub use memory::InMemoryModelStore;
pub use sled_store::SledModelStore;
pub use sqlite_store::SqliteModelStore;

use crate::error::Result;
use crate::models::ModelRecord;
use async_trait::async_trait;

/// Trait for model persistence operations
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Load a model record; `None` when the id has never been saved
    async fn load(&self, id: &str) -> Result<Option<ModelRecord>>;

    /// Persist a record with compare-and-set on its version
    async fn save(&self, record: &ModelRecord) -> Result<()>;

    /// Number of stored models
    async fn count(&self) -> Result<u64>;

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<()> {
        self.count().await.map(|_| ())
    }

    /// Short backend name used in logs and metrics
    fn backend_name(&self) -> &'static str;
}
