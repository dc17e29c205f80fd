//! Relational model store on SQLite
//!
//! Single table, keyed by model id:
//! `models(id TEXT PRIMARY KEY, state BLOB, version INTEGER, updated_at TIMESTAMP)`.
//! Version checks are folded into the write statement itself so no transaction is
//! needed to keep compare-and-set atomic.

use crate::error::{AppError, Result};
use crate::models::ModelRecord;
use crate::store::ModelStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Model store backed by a SQLite connection pool
#[derive(Clone)]
pub struct SqliteModelStore {
    pool: SqlitePool,
}

impl SqliteModelStore {
    /// Connect to `database_url`, creating the database file and schema if needed
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self> {
        if let Some(path) = Self::file_path(database_url) {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }

        // WAL lets readers proceed while one writer holds the lock
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::Configuration(format!("Invalid SQLite URL: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size.max(1))
            .connect_with(options)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to open SQLite database: {}", e)))?;

        let store = Self::from_pool(pool).await?;
        tracing::info!(url = %database_url, "Initialized SQLite model store");
        Ok(store)
    }

    /// Wrap an existing pool and make sure the schema exists
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS models (
                id TEXT PRIMARY KEY,
                state BLOB NOT NULL,
                version INTEGER NOT NULL,
                updated_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    fn file_path(database_url: &str) -> Option<&Path> {
        let rest = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next()?;
        if path.is_empty() || path == ":memory:" {
            return None;
        }
        Some(Path::new(path))
    }

    async fn current_version(&self, id: &str) -> Result<u64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT version FROM models WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(version.map(|v| v as u64).unwrap_or(0))
    }

    fn to_db_version(version: u64) -> Result<i64> {
        i64::try_from(version)
            .map_err(|_| AppError::Internal(format!("version {} exceeds column range", version)))
    }
}

#[async_trait]
impl ModelStore for SqliteModelStore {
    async fn load(&self, id: &str) -> Result<Option<ModelRecord>> {
        let row = sqlx::query("SELECT id, state, version, updated_at FROM models WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let version: i64 = row.try_get("version")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(Some(ModelRecord {
            id: row.try_get("id")?,
            state: row.try_get("state")?,
            version: version as u64,
            updated_at,
        }))
    }

    async fn save(&self, record: &ModelRecord) -> Result<()> {
        let expected = record.expected_stored_version();
        let version = Self::to_db_version(record.version)?;

        let result = if expected == 0 {
            sqlx::query(
                "INSERT INTO models (id, state, version, updated_at) VALUES (?, ?, ?, ?) \
                 ON CONFLICT(id) DO NOTHING",
            )
            .bind(&record.id)
            .bind(&record.state)
            .bind(version)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                "UPDATE models SET state = ?, version = ?, updated_at = ? \
                 WHERE id = ? AND version = ?",
            )
            .bind(&record.state)
            .bind(version)
            .bind(record.updated_at)
            .bind(&record.id)
            .bind(Self::to_db_version(expected)?)
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            let found = self.current_version(&record.id).await?;
            return Err(AppError::Conflict {
                id: record.id.clone(),
                expected,
                found,
            });
        }

        tracing::debug!(model_id = %record.id, version = record.version, "Model saved to SQLite");
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM models")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_store(dir: &TempDir) -> SqliteModelStore {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("models.db").display());
        SqliteModelStore::connect(&url, 4).await.unwrap()
    }

    #[test]
    fn test_file_path_parsing() {
        assert_eq!(
            SqliteModelStore::file_path("sqlite://./data/models.db?mode=rwc"),
            Some(Path::new("./data/models.db"))
        );
        assert_eq!(SqliteModelStore::file_path("sqlite::memory:"), None);
        assert_eq!(SqliteModelStore::file_path("postgres://x"), None);
    }

    #[tokio::test]
    async fn test_insert_then_update() {
        let dir = TempDir::new().unwrap();
        let store = temp_store(&dir).await;

        let first = ModelRecord::initial("m1", vec![1, 2]);
        store.save(&first).await.unwrap();
        let second = first.next(vec![3, 4]);
        store.save(&second).await.unwrap();

        let loaded = store.load("m1").await.unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.state, vec![3, 4]);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let dir = TempDir::new().unwrap();
        let store = temp_store(&dir).await;

        let first = ModelRecord::initial("m1", vec![1]);
        store.save(&first).await.unwrap();

        let err = store.save(&ModelRecord::initial("m1", vec![2])).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { expected: 0, found: 1, .. }));
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let dir = TempDir::new().unwrap();
        let store = temp_store(&dir).await;

        let first = ModelRecord::initial("m1", vec![1]);
        store.save(&first).await.unwrap();
        store.save(&first.next(vec![2])).await.unwrap();

        let err = store.save(&first.next(vec![5])).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { expected: 1, found: 2, .. }));
        assert_eq!(store.load("m1").await.unwrap().unwrap().state, vec![2]);
    }

    #[tokio::test]
    async fn test_missing_model() {
        let dir = TempDir::new().unwrap();
        let store = temp_store(&dir).await;

        assert!(store.load("nope").await.unwrap().is_none());
        assert!(store.ping().await.is_ok());
    }
}
