use model_grid::{
    config::{StoreBackend, StoreConfig},
    models::ModelRecord,
    store::{create_store, InMemoryModelStore, ModelStore, SledModelStore, SqliteModelStore},
    AppError,
};
use std::sync::Arc;
use tempfile::TempDir;

/// Test suite that runs against any ModelStore implementation
async fn test_store_operations(store: Arc<dyn ModelStore>) {
    // Test 1: Missing model
    assert!(store.load("m1").await.unwrap().is_none());
    assert_eq!(store.count().await.unwrap(), 0);

    // Test 2: First save must be version 1
    let v1 = ModelRecord::initial("m1", vec![1, 2, 3]);
    store.save(&v1).await.unwrap();

    let loaded = store.load("m1").await.unwrap().unwrap();
    assert_eq!(loaded.version, 1);
    assert_eq!(loaded.state, vec![1, 2, 3]);

    // Test 3: Successor accepted
    let v2 = loaded.next(vec![4]);
    store.save(&v2).await.unwrap();
    assert_eq!(store.load("m1").await.unwrap().unwrap().version, 2);

    // Test 4: Replaying an old version is a conflict
    match store.save(&v2).await {
        Err(AppError::Conflict { id, expected, found }) => {
            assert_eq!(id, "m1");
            assert_eq!(expected, 1);
            assert_eq!(found, 2);
        }
        other => panic!("expected conflict, got {:?}", other),
    }

    // Test 5: Skipping a version is a conflict
    let mut skipped = v2.next(vec![5]);
    skipped.version = 4;
    assert!(matches!(
        store.save(&skipped).await,
        Err(AppError::Conflict { .. })
    ));

    // Test 6: A fresh id cannot start above version 1
    let mut orphan = ModelRecord::initial("m2", vec![]);
    orphan.version = 3;
    assert!(matches!(
        store.save(&orphan).await,
        Err(AppError::Conflict { found: 0, .. })
    ));

    // Test 7: Count and health
    assert_eq!(store.count().await.unwrap(), 1);
    store.ping().await.unwrap();
}

/// Racing writers of the same version: exactly one wins
async fn test_concurrent_first_writes(store: Arc<dyn ModelStore>) {
    let tasks: Vec<_> = (0..8u8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.save(&ModelRecord::initial("race", vec![i])).await })
        })
        .collect();

    let mut wins = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => wins += 1,
            Err(AppError::Conflict { .. }) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(store.load("race").await.unwrap().unwrap().version, 1);
}

#[tokio::test]
async fn test_in_memory_store() {
    test_store_operations(Arc::new(InMemoryModelStore::new())).await;
    test_concurrent_first_writes(Arc::new(InMemoryModelStore::new())).await;
}

#[tokio::test]
async fn test_sled_store() {
    let temp_dir = TempDir::new().unwrap();
    let store = SledModelStore::new(temp_dir.path().join("models")).unwrap();
    test_store_operations(Arc::new(store)).await;

    let race_dir = TempDir::new().unwrap();
    let store = SledModelStore::new(race_dir.path()).unwrap();
    test_concurrent_first_writes(Arc::new(store)).await;
}

#[tokio::test]
async fn test_sqlite_store() {
    let temp_dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", temp_dir.path().join("models.db").display());
    let store = SqliteModelStore::connect(&url, 4).await.unwrap();
    test_store_operations(Arc::new(store)).await;

    let url = format!("sqlite://{}", temp_dir.path().join("race.db").display());
    let store = SqliteModelStore::connect(&url, 4).await.unwrap();
    test_concurrent_first_writes(Arc::new(store)).await;
}

#[tokio::test]
async fn test_sqlite_persists_across_connections() {
    let temp_dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", temp_dir.path().join("nested/dir/models.db").display());

    {
        let store = SqliteModelStore::connect(&url, 2).await.unwrap();
        store.save(&ModelRecord::initial("m1", vec![9])).await.unwrap();
    }

    let store = SqliteModelStore::connect(&url, 2).await.unwrap();
    let record = store.load("m1").await.unwrap().unwrap();
    assert_eq!(record.version, 1);
    assert_eq!(record.state, vec![9]);
}

#[tokio::test]
async fn test_store_factory() {
    let temp_dir = TempDir::new().unwrap();

    let sled = create_store(&StoreConfig {
        backend: StoreBackend::Sled,
        database_url: None,
        path: Some(temp_dir.path().join("sled")),
        pool_size: 1,
    })
    .await
    .unwrap();
    assert_eq!(sled.backend_name(), "sled");

    let memory = create_store(&StoreConfig {
        backend: StoreBackend::Memory,
        database_url: None,
        path: None,
        pool_size: 1,
    })
    .await
    .unwrap();
    assert_eq!(memory.backend_name(), "memory");

    let missing_url = create_store(&StoreConfig {
        backend: StoreBackend::Sqlite,
        database_url: None,
        path: None,
        pool_size: 1,
    })
    .await;
    assert!(matches!(missing_url, Err(AppError::Configuration(_))));
}
