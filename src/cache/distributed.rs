use crate::cache::{KeyedLocks, NearCache, RetryPolicy};
use crate::config::CacheConfig;
use crate::error::{AppError, Result};
use crate::metrics::{
    CACHE_ENTRIES, CACHE_LOOKUPS_TOTAL, CACHE_WRITE_THROUGH_EVENTS_TOTAL,
    STORAGE_OPERATIONS_TOTAL, STORAGE_OPERATION_DURATION_SECONDS,
};
use crate::models::ModelRecord;
use crate::store::ModelStore;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Read-through, write-through model cache in front of a `ModelStore`
///
/// All writes and all cache misses for one id run under that id's lock, so a miss is
/// loaded once however many callers race on it, and updates to one id never
/// interleave. The near-cache entry is dropped before each durable write and
/// reinstalled only after the store acknowledges, which keeps it from ever holding a
/// value the store does not.
pub struct DistributedModelCache {
    near: NearCache,
    store: Arc<dyn ModelStore>,
    locks: KeyedLocks,
    retry: RetryPolicy,
    store_timeout: Duration,
}

impl DistributedModelCache {
    pub fn new(store: Arc<dyn ModelStore>, config: &CacheConfig, retry: RetryPolicy) -> Self {
        Self {
            near: NearCache::new(config.max_capacity, config.ttl()),
            store,
            locks: KeyedLocks::new(config.lock_shards, config.lock_timeout()),
            retry,
            store_timeout: config.store_timeout(),
        }
    }

    /// Backing store
    pub fn store(&self) -> &Arc<dyn ModelStore> {
        &self.store
    }

    /// Get a model, loading it from the store on a miss
    pub async fn get(&self, id: &str) -> Result<ModelRecord> {
        if let Some(record) = self.near.get(id).await {
            CACHE_LOOKUPS_TOTAL.with_label_values(&["hit"]).inc();
            return Ok(record);
        }
        CACHE_LOOKUPS_TOTAL.with_label_values(&["miss"]).inc();

        let _guard = self.locks.lock(id).await?;
        self.current_locked(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("model '{}'", id)))
    }

    /// Write a record through to the store, then cache it
    pub async fn put(&self, record: ModelRecord) -> Result<()> {
        let _guard = self.locks.lock(&record.id).await?;
        self.write_through(&record).await
    }

    /// Derive and write the next version of a model
    ///
    /// `next_state` receives the current record (`None` for a new model) and returns
    /// the state to persist. If another writer got there first the cache entry is
    /// reloaded from the store and `next_state` runs once more; a second conflict is
    /// returned to the caller.
    pub async fn update<F>(&self, id: &str, next_state: F) -> Result<ModelRecord>
    where
        F: Fn(Option<&ModelRecord>) -> Result<Vec<u8>>,
    {
        let _guard = self.locks.lock(id).await?;

        let current = self.current_locked(id).await?;
        let next = Self::successor(id, current.as_ref(), next_state(current.as_ref())?);

        match self.write_through(&next).await {
            Ok(()) => Ok(next),
            Err(AppError::Conflict { expected, found, .. }) => {
                warn!(
                    model_id = %id,
                    expected,
                    found,
                    "Stale model version, reloading and retrying once"
                );
                CACHE_WRITE_THROUGH_EVENTS_TOTAL
                    .with_label_values(&["conflict_retry"])
                    .inc();

                let reloaded = self.load_through(id).await?;
                let retry =
                    Self::successor(id, reloaded.as_ref(), next_state(reloaded.as_ref())?);
                self.write_through(&retry).await?;
                Ok(retry)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop a cached entry so the next read goes to the store
    pub async fn invalidate(&self, id: &str) {
        self.near.invalidate(id).await;
        CACHE_WRITE_THROUGH_EVENTS_TOTAL
            .with_label_values(&["invalidated"])
            .inc();
    }

    /// Check the backing store answers within the store timeout; returns its model count
    pub async fn probe_store(&self) -> Result<u64> {
        self.observe("ping", self.store.ping()).await?;
        self.observe("count", self.store.count()).await
    }

    /// Cached value without falling through to the store
    pub async fn peek(&self, id: &str) -> Option<ModelRecord> {
        self.near.get(id).await
    }

    pub async fn entry_count(&self) -> u64 {
        self.near.sync().await;
        self.near.entry_count()
    }

    fn successor(id: &str, current: Option<&ModelRecord>, state: Vec<u8>) -> ModelRecord {
        match current {
            Some(record) => record.next(state),
            None => ModelRecord::initial(id, state),
        }
    }

    /// Cached record, or the stored one installed into the cache. Caller holds the lock.
    async fn current_locked(&self, id: &str) -> Result<Option<ModelRecord>> {
        if let Some(record) = self.near.get(id).await {
            return Ok(Some(record));
        }

        let loaded = self.load_through(id).await?;
        if let Some(ref record) = loaded {
            debug!(model_id = %id, version = record.version, "Loaded model from store");
            self.near.install(record.clone()).await;
            CACHE_ENTRIES.set(self.near.entry_count() as i64);
        }
        Ok(loaded)
    }

    async fn load_through(&self, id: &str) -> Result<Option<ModelRecord>> {
        self.retry
            .run("load", move |_| self.observe("load", self.store.load(id)))
            .await
    }

    async fn write_through(&self, record: &ModelRecord) -> Result<()> {
        // Dropped first: if the caller is cancelled after the store acknowledges,
        // the next read reloads instead of trusting a stale entry
        self.near.invalidate(&record.id).await;

        let outcome = self
            .retry
            .run("save", move |attempt| async move {
                let result = self.observe("save", self.store.save(record)).await;
                if let Err(AppError::Conflict { found, .. }) = &result {
                    // An earlier attempt may have committed before timing out
                    if attempt > 1 && *found == record.version && self.already_applied(record).await? {
                        return Ok(());
                    }
                }
                result
            })
            .await;

        match outcome {
            Ok(()) => {
                self.near.install(record.clone()).await;
                CACHE_ENTRIES.set(self.near.entry_count() as i64);
                debug!(model_id = %record.id, version = record.version, "Model written through");
                Ok(())
            }
            Err(e) => {
                if matches!(e, AppError::Conflict { .. }) {
                    CACHE_WRITE_THROUGH_EVENTS_TOTAL
                        .with_label_values(&["conflict"])
                        .inc();
                }
                warn!(model_id = %record.id, version = record.version, error = %e, "Write-through failed");
                Err(e)
            }
        }
    }

    async fn already_applied(&self, record: &ModelRecord) -> Result<bool> {
        let stored = self.observe("load", self.store.load(&record.id)).await?;
        Ok(stored
            .map(|s| s.version == record.version && s.state == record.state)
            .unwrap_or(false))
    }

    /// Bound a store call by the store timeout and record it
    async fn observe<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let backend = self.store.backend_name();
        let start = Instant::now();

        let result = match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "store {} exceeded {:?}",
                operation, self.store_timeout
            ))),
        };

        let status = match &result {
            Ok(_) => "success",
            Err(AppError::Conflict { .. }) => "conflict",
            Err(AppError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        STORAGE_OPERATIONS_TOTAL
            .with_label_values(&[backend, operation, status])
            .inc();
        STORAGE_OPERATION_DURATION_SECONDS
            .with_label_values(&[backend, operation])
            .observe(start.elapsed().as_secs_f64());

        result
    }
}
