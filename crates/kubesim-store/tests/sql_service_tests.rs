//! Cache service against a real SQLite database.

use kubesim_core::{CacheId, CallerToken, NewCacheEntry};
use kubesim_resilience::RetryPolicy;
use kubesim_store::schema::ensure_schema;
use kubesim_store::{
    CacheService, CacheStore, DatabasePool, PoolConfig, SeedReport, SqlCacheStore,
};
use std::sync::Arc;

async fn sqlite_store() -> SqlCacheStore {
    let pool = DatabasePool::connect("sqlite::memory:", &PoolConfig::single())
        .await
        .unwrap();
    ensure_schema(&pool).await.unwrap();
    SqlCacheStore::new(pool, RetryPolicy::no_retry())
}

async fn memory_service() -> CacheService {
    CacheService::new(Arc::new(sqlite_store().await))
}

#[tokio::test]
async fn test_inserted_entries_read_back_unchanged() {
    let store = sqlite_store().await;
    let owner = CallerToken::generate();

    for i in 0..20 {
        let stored = store
            .insert(NewCacheEntry::owned(owner, format!("/api/v1/pods/{i}"), "{}"))
            .await
            .unwrap();
        let loaded = store.by_cache_id(&stored.cache_id).await.unwrap().unwrap();
        assert_eq!(loaded, stored);
    }

    let service = CacheService::new(Arc::new(store));
    let id = service
        .store(owner, "/api/v1/nodes", "{}".to_string(), false)
        .await
        .unwrap();
    let fetched = service.fetch_by_id(&id, &owner).await.unwrap();
    let latest = service.fetch_latest_by_path(&owner, "/api/v1/nodes").await.unwrap();
    assert_eq!(fetched, latest);
}

#[tokio::test]
async fn test_full_cache_lifecycle() {
    let service = memory_service().await;
    let owner = CallerToken::generate();
    let stranger = CallerToken::generate();

    let id = service
        .store(owner, "/api/v1/pods", r#"{"kind":"PodList","items":[]}"#.to_string(), false)
        .await
        .unwrap();

    let entry = service.fetch_by_id(&id, &owner).await.unwrap();
    assert_eq!(entry.response, r#"{"kind":"PodList","items":[]}"#);
    assert_eq!(
        service.fetch_by_id(&id, &stranger).await.unwrap_err().status_code(),
        404
    );

    let latest = service
        .fetch_latest_by_path(&owner, "/api/v1/pods")
        .await
        .unwrap();
    assert_eq!(latest.cache_id, id);

    assert_eq!(
        service.delete(&id, &stranger).await.unwrap_err().status_code(),
        403
    );
    service.delete(&id, &owner).await.unwrap();
    assert_eq!(
        service.delete(&id, &owner).await.unwrap_err().status_code(),
        404
    );
}

#[tokio::test]
async fn test_seeding_twice_keeps_one_entry_per_path() {
    let service = memory_service().await;
    let seed = vec![("/api".to_string(), r#"{"versions":["v1"]}"#.to_string())];

    let first = service.seed_predefined(seed.clone()).await.unwrap();
    let second = service.seed_predefined(seed).await.unwrap();
    assert_eq!(first, SeedReport { inserted: 1, skipped: 0 });
    assert_eq!(second, SeedReport { inserted: 0, skipped: 1 });

    let viewer = CallerToken::generate();
    let visible = service.fetch_all(&viewer).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert!(visible[0].is_predefined);
    assert!(visible[0].user_token.is_none());
}

#[tokio::test]
async fn test_predefined_entries_cannot_be_deleted() {
    let service = memory_service().await;
    service
        .seed_predefined([("/apis".to_string(), "{}".to_string())])
        .await
        .unwrap();

    let viewer = CallerToken::generate();
    let seeded = service.fetch_latest_by_path(&viewer, "/apis").await.unwrap();
    let err = service.delete(&seeded.cache_id, &viewer).await.unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let service = memory_service().await;
    let err = service
        .fetch_by_id(&CacheId::generate(), &CallerToken::generate())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_file_backed_database_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("cache.db").display());
    let owner = CallerToken::generate();

    let id = {
        let pool = DatabasePool::connect(&url, &PoolConfig::single()).await.unwrap();
        ensure_schema(&pool).await.unwrap();
        let service = CacheService::new(Arc::new(SqlCacheStore::new(
            pool.clone(),
            RetryPolicy::no_retry(),
        )));
        let id = service
            .store(owner, "/api", "{}".to_string(), false)
            .await
            .unwrap();
        pool.close().await;
        id
    };

    let pool = DatabasePool::connect(&url, &PoolConfig::single()).await.unwrap();
    let service = CacheService::new(Arc::new(SqlCacheStore::new(pool, RetryPolicy::no_retry())));
    assert_eq!(service.fetch_by_id(&id, &owner).await.unwrap().cache_id, id);
}
