use crate::error::{AppError, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Per-model-id mutual exclusion over a fixed set of async mutex shards
///
/// Ids hashing to the same shard share a mutex. Holders must never take a second
/// shard while holding one.
pub struct KeyedLocks {
    shards: Vec<Mutex<()>>,
    timeout: Duration,
}

impl KeyedLocks {
    pub fn new(shards: usize, timeout: Duration) -> Self {
        let shards = (0..shards.max(1)).map(|_| Mutex::new(())).collect();
        Self { shards, timeout }
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    /// Acquire the lock for `key`, giving up with a retryable timeout
    pub async fn lock(&self, key: &str) -> Result<MutexGuard<'_, ()>> {
        let shard = &self.shards[self.shard_index(key)];
        tokio::time::timeout(self.timeout, shard.lock())
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "waited {:?} for lock on model '{}'",
                    self.timeout, key
                ))
            })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = KeyedLocks::new(8, Duration::from_millis(20));

        let guard = locks.lock("m1").await.unwrap();
        let second = locks.lock("m1").await;
        assert!(matches!(second, Err(AppError::Timeout(_))));

        drop(guard);
        assert!(locks.lock("m1").await.is_ok());
    }

    #[test]
    fn test_shard_index_is_stable() {
        let locks = KeyedLocks::new(16, Duration::from_secs(1));
        assert_eq!(locks.shard_index("model-a"), locks.shard_index("model-a"));
        assert!(locks.shard_index("model-b") < locks.shard_count());
    }

    #[test]
    fn test_zero_shards_clamped() {
        let locks = KeyedLocks::new(0, Duration::from_secs(1));
        assert_eq!(locks.shard_count(), 1);
    }
}
