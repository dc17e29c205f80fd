use crate::error::{AppError, Result};
use crate::models::ModelRecord;
use crate::store::ModelStore;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory model store (for development and testing)
#[derive(Clone, Default)]
pub struct InMemoryModelStore {
    models: Arc<DashMap<String, ModelRecord>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelStore for InMemoryModelStore {
    async fn load(&self, id: &str) -> Result<Option<ModelRecord>> {
        Ok(self.models.get(id).map(|entry| entry.clone()))
    }

    async fn save(&self, record: &ModelRecord) -> Result<()> {
        let expected = record.expected_stored_version();

        // The entry guard holds the shard lock, making check-and-insert atomic
        match self.models.entry(record.id.clone()) {
            Entry::Occupied(mut entry) => {
                let found = entry.get().version;
                if found != expected {
                    return Err(AppError::Conflict {
                        id: record.id.clone(),
                        expected,
                        found,
                    });
                }
                entry.insert(record.clone());
            }
            Entry::Vacant(entry) => {
                if expected != 0 {
                    return Err(AppError::Conflict {
                        id: record.id.clone(),
                        expected,
                        found: 0,
                    });
                }
                entry.insert(record.clone());
            }
        }

        tracing::debug!(model_id = %record.id, version = record.version, "Model saved");
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.models.len() as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_load() {
        let store = InMemoryModelStore::new();
        let record = ModelRecord::initial("m1", vec![1, 2, 3]);

        store.save(&record).await.unwrap();

        let loaded = store.load("m1").await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.state, vec![1, 2, 3]);
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_version_rejected() {
        let store = InMemoryModelStore::new();
        let first = ModelRecord::initial("m1", vec![1]);
        store.save(&first).await.unwrap();

        let second = first.next(vec![2]);
        store.save(&second).await.unwrap();

        // A writer that still holds version 1 tries to write version 2 again
        let stale = first.next(vec![9]);
        let err = store.save(&stale).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Conflict { expected: 1, found: 2, .. }
        ));

        let loaded = store.load("m1").await.unwrap().unwrap();
        assert_eq!(loaded.state, vec![2]);
    }

    #[tokio::test]
    async fn test_version_gap_on_absent_id_rejected() {
        let store = InMemoryModelStore::new();
        let mut record = ModelRecord::initial("m1", vec![1]);
        record.version = 3;

        let err = store.save(&record).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { found: 0, .. }));
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
