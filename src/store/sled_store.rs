use crate::error::{AppError, Result};
use crate::models::ModelRecord;
use crate::store::ModelStore;
use async_trait::async_trait;
use sled::{Db, IVec};
use std::path::Path;
use std::sync::Arc;

/// Persistent model store using the Sled embedded database
#[derive(Clone)]
pub struct SledModelStore {
    db: Arc<Db>,
    models_tree: sled::Tree,
}

impl SledModelStore {
    /// Create a new Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            AppError::Storage(format!("Failed to open Sled database: {}", e))
        })?;

        let models_tree = db.open_tree("models").map_err(|e| {
            AppError::Storage(format!("Failed to open models tree: {}", e))
        })?;

        tracing::info!("Initialized Sled model store at {:?}", path.as_ref());

        Ok(Self {
            db: Arc::new(db),
            models_tree,
        })
    }

    fn serialize_record(record: &ModelRecord) -> Result<Vec<u8>> {
        bincode::serialize(record).map_err(|e| {
            AppError::Serialization(format!("Failed to serialize model record: {}", e))
        })
    }

    fn deserialize_record(bytes: &[u8]) -> Result<ModelRecord> {
        bincode::deserialize(bytes).map_err(|e| {
            AppError::Serialization(format!("Failed to deserialize model record: {}", e))
        })
    }

    fn stored_version(bytes: Option<&IVec>) -> Result<u64> {
        match bytes {
            Some(bytes) => Ok(Self::deserialize_record(bytes)?.version),
            None => Ok(0),
        }
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await.map_err(|e| {
            AppError::Storage(format!("Failed to flush database: {}", e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl ModelStore for SledModelStore {
    async fn load(&self, id: &str) -> Result<Option<ModelRecord>> {
        match self.models_tree.get(id.as_bytes()) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize_record(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(AppError::Storage(format!("Failed to load model: {}", e))),
        }
    }

    async fn save(&self, record: &ModelRecord) -> Result<()> {
        let key = record.id.as_bytes();
        let value = Self::serialize_record(record)?;
        let expected = record.expected_stored_version();

        loop {
            let current = self.models_tree.get(key)?;
            let found = Self::stored_version(current.as_ref())?;
            if found != expected {
                return Err(AppError::Conflict {
                    id: record.id.clone(),
                    expected,
                    found,
                });
            }

            // Another writer may slip in between the read and the swap; re-check then
            match self
                .models_tree
                .compare_and_swap(key, current, Some(value.clone()))?
            {
                Ok(()) => break,
                Err(_) => continue,
            }
        }

        self.models_tree.flush_async().await.map_err(|e| {
            AppError::Storage(format!("Failed to flush models tree: {}", e))
        })?;

        tracing::debug!(model_id = %record.id, version = record.version, "Model saved to Sled");
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.models_tree.len() as u64)
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SledModelStore::new(dir.path()).unwrap();

        let record = ModelRecord::initial("m1", vec![7, 7]);
        store.save(&record).await.unwrap();

        let loaded = store.load("m1").await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_conflict_leaves_row_untouched() {
        let dir = TempDir::new().unwrap();
        let store = SledModelStore::new(dir.path()).unwrap();

        let first = ModelRecord::initial("m1", vec![1]);
        store.save(&first).await.unwrap();

        let err = store.save(&first).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { expected: 0, found: 1, .. }));

        store.save(&first.next(vec![2])).await.unwrap();
        assert_eq!(store.load("m1").await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = SledModelStore::new(dir.path()).unwrap();
            store.save(&ModelRecord::initial("m1", vec![3])).await.unwrap();
            store.flush().await.unwrap();
        }

        let reopened = SledModelStore::new(dir.path()).unwrap();
        assert_eq!(reopened.load("m1").await.unwrap().unwrap().state, vec![3]);
    }
}
