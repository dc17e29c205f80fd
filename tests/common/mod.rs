//! Store doubles and builders shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use model_grid::{
    cache::{DistributedModelCache, RetryPolicy},
    config::CacheConfig,
    models::ModelRecord,
    store::{InMemoryModelStore, ModelStore},
    AppError, Result,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory store that counts calls and records every accepted save
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryModelStore,
    loads: AtomicUsize,
    save_calls: AtomicUsize,
    saved: Mutex<Vec<(String, u64)>>,
    load_delay: Duration,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every load sleeps first, widening the window for racing readers
    pub fn with_load_delay(delay: Duration) -> Self {
        Self {
            load_delay: delay,
            ..Self::default()
        }
    }

    /// Write straight to the underlying store, bypassing the counters
    pub async fn seed(&self, record: &ModelRecord) {
        self.inner.save(record).await.unwrap();
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.loads() + self.save_calls()
    }

    /// Versions durably written for one id, in commit order
    pub fn saved_versions(&self, id: &str) -> Vec<u64> {
        self.saved
            .lock()
            .iter()
            .filter(|(saved_id, _)| saved_id == id)
            .map(|(_, version)| *version)
            .collect()
    }
}

#[async_trait]
impl ModelStore for CountingStore {
    async fn load(&self, id: &str) -> Result<Option<ModelRecord>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        self.inner.load(id).await
    }

    async fn save(&self, record: &ModelRecord) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.save(record).await?;
        self.saved.lock().push((record.id.clone(), record.version));
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

/// In-memory store whose saves fail on demand
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryModelStore,
    /// Saves still to reject outright with a storage error
    failures: AtomicU32,
    /// Saves still to commit but then report as timed out
    lost_acks: AtomicU32,
    /// Saves from this version on sleep before committing
    commit_delay: Option<(u64, Duration)>,
    /// Saves from this version on commit, then sleep before acknowledging
    ack_delay: Option<(u64, Duration)>,
    /// Every save loses to a writer one version ahead
    always_stale: bool,
    save_attempts: AtomicU32,
}

impl FlakyStore {
    pub fn failing(failures: u32) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    pub fn losing_acks(lost_acks: u32) -> Self {
        Self {
            lost_acks: AtomicU32::new(lost_acks),
            ..Self::default()
        }
    }

    pub fn committing_slowly_from(version: u64, delay: Duration) -> Self {
        Self {
            commit_delay: Some((version, delay)),
            ..Self::default()
        }
    }

    pub fn acking_slowly_from(version: u64, delay: Duration) -> Self {
        Self {
            ack_delay: Some((version, delay)),
            ..Self::default()
        }
    }

    pub fn always_stale() -> Self {
        Self {
            always_stale: true,
            ..Self::default()
        }
    }

    pub fn save_attempts(&self) -> u32 {
        self.save_attempts.load(Ordering::SeqCst)
    }

    async fn pause(delay: Option<(u64, Duration)>, record: &ModelRecord) {
        if let Some((from, delay)) = delay {
            if record.version >= from {
                tokio::time::sleep(delay).await;
            }
        }
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ModelStore for FlakyStore {
    async fn load(&self, id: &str) -> Result<Option<ModelRecord>> {
        self.inner.load(id).await
    }

    async fn save(&self, record: &ModelRecord) -> Result<()> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        if Self::take(&self.failures) {
            return Err(AppError::Storage("connection refused".to_string()));
        }
        if self.always_stale {
            return Err(AppError::Conflict {
                id: record.id.clone(),
                expected: record.version - 1,
                found: record.version + 1,
            });
        }

        Self::pause(self.commit_delay, record).await;
        self.inner.save(record).await?;
        Self::pause(self.ack_delay, record).await;
        if Self::take(&self.lost_acks) {
            return Err(AppError::Timeout("acknowledgement lost".to_string()));
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// Store that never answers
pub struct HangingStore;

#[async_trait]
impl ModelStore for HangingStore {
    async fn load(&self, _id: &str) -> Result<Option<ModelRecord>> {
        std::future::pending().await
    }

    async fn save(&self, _record: &ModelRecord) -> Result<()> {
        std::future::pending().await
    }

    async fn count(&self) -> Result<u64> {
        std::future::pending().await
    }

    fn backend_name(&self) -> &'static str {
        "hanging"
    }
}

/// Retries quickly enough for tests
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_millis(1),
        Duration::from_millis(5),
    )
}

pub fn cache_over(store: Arc<dyn ModelStore>, retry: RetryPolicy) -> Arc<DistributedModelCache> {
    Arc::new(DistributedModelCache::new(
        store,
        &CacheConfig::default(),
        retry,
    ))
}
