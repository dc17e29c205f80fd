use crate::config::{StoreBackend, StoreConfig};
use crate::error::{AppError, Result};
use crate::store::{InMemoryModelStore, ModelStore, SledModelStore, SqliteModelStore};
use std::sync::Arc;

/// Create a model store based on configuration
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn ModelStore>> {
    match config.backend {
        StoreBackend::Sqlite => {
            let url = config.database_url.as_ref().ok_or_else(|| {
                AppError::Configuration(
                    "SQLite backend requires 'database_url' configuration".to_string(),
                )
            })?;

            tracing::info!(url = %url, "Initializing SQLite storage backend");

            let store = SqliteModelStore::connect(url, config.pool_size).await?;
            Ok(Arc::new(store))
        }

        StoreBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration("Sled backend requires 'path' configuration".to_string())
            })?;

            tracing::info!(path = ?path, "Initializing Sled storage backend");

            let store = SledModelStore::new(path)?;
            Ok(Arc::new(store))
        }

        StoreBackend::Memory => {
            tracing::warn!("In-memory storage backend selected; models are lost on restart");
            Ok(create_in_memory_store())
        }
    }
}

/// Create an in-memory store (for testing and development)
pub fn create_in_memory_store() -> Arc<dyn ModelStore> {
    tracing::info!("Initializing in-memory storage backend");
    Arc::new(InMemoryModelStore::new())
}
