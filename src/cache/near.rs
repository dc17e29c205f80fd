use crate::models::ModelRecord;
use moka::future::Cache;
use std::time::Duration;

/// Node-local mirror of model records, backed by Moka
///
/// Only `DistributedModelCache` writes to it, and only while holding the model's lock.
#[derive(Clone)]
pub struct NearCache {
    cache: Cache<String, ModelRecord>,
}

impl NearCache {
    pub fn new(max_capacity: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(max_capacity);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }

        Self {
            cache: builder.build(),
        }
    }

    pub async fn get(&self, id: &str) -> Option<ModelRecord> {
        self.cache.get(id).await
    }

    /// Install a record unless a newer version is already cached
    pub async fn install(&self, record: ModelRecord) {
        if let Some(current) = self.cache.get(record.id.as_str()).await {
            if current.version > record.version {
                return;
            }
        }
        self.cache.insert(record.id.clone(), record).await;
    }

    pub async fn invalidate(&self, id: &str) {
        self.cache.invalidate(id).await;
    }

    /// Approximate entry count; call `sync` first for an exact figure
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}
