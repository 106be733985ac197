//! SQL backend.
//!
//! Every operation runs in its own transaction and under the retry policy.
//! Each attempt begins a fresh transaction; a failed attempt is rolled back
//! before the policy decides whether to try again, and a successful one is
//! committed before its result is returned.

use crate::error::{Result, StoreError};
use crate::pool::DatabasePool;
use crate::store::CacheStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use kubesim_core::{CacheEntry, CacheId, CallerToken, NewCacheEntry};
use kubesim_resilience::RetryPolicy;
use sqlx::any::AnyRow;
use sqlx::AnyConnection;
use sqlx::Row;
use tracing::{debug, warn};

const LATEST_VISIBLE: &str = "SELECT id, cache_id, user_token, api_path, response, is_predefined, created_at \
     FROM api_cache WHERE api_path = $1 AND (user_token = $2 OR is_predefined = 1) \
     ORDER BY created_at DESC, id DESC LIMIT 1";

const LATEST_PREDEFINED: &str = "SELECT id, cache_id, user_token, api_path, response, is_predefined, created_at \
     FROM api_cache WHERE api_path = $1 AND is_predefined = 1 \
     ORDER BY created_at DESC, id DESC LIMIT 1";

const BY_CACHE_ID: &str = "SELECT id, cache_id, user_token, api_path, response, is_predefined, created_at \
     FROM api_cache WHERE cache_id = $1";

const LIST_VISIBLE: &str = "SELECT id, cache_id, user_token, api_path, response, is_predefined, created_at \
     FROM api_cache WHERE user_token = $1 OR is_predefined = 1 \
     ORDER BY created_at DESC, id DESC";

/// Cache store backed by PostgreSQL or SQLite.
#[derive(Debug, Clone)]
pub struct SqlCacheStore {
    pool: DatabasePool,
    retry: RetryPolicy,
}

impl SqlCacheStore {
    /// Create a store on top of an open pool.
    #[must_use]
    pub fn new(pool: DatabasePool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Underlying pool.
    #[must_use]
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Run `op` inside a transaction, retrying dropped connections.
    async fn run<T, F>(&self, op_name: &'static str, op: F) -> Result<T>
    where
        T: Send,
        F: for<'c> Fn(&'c mut AnyConnection) -> BoxFuture<'c, std::result::Result<T, sqlx::Error>>
            + Send
            + Sync,
    {
        let pool = self.pool.inner();
        let op = &op;

        self.retry
            .execute(
                move || async move {
                    let mut tx = pool.begin().await?;
                    match op(&mut *tx).await {
                        Ok(value) => {
                            tx.commit().await?;
                            Ok::<T, StoreError>(value)
                        }
                        Err(err) => {
                            if let Err(rollback_err) = tx.rollback().await {
                                debug!(op = op_name, error = %rollback_err, "Rollback failed");
                            }
                            Err(StoreError::from(err))
                        }
                    }
                },
                StoreError::is_transient,
            )
            .await
            .map_err(|err| {
                warn!(op = op_name, error = %err, "Store operation failed");
                err
            })
    }
}

fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn entry_from_row(row: &AnyRow) -> Result<CacheEntry> {
    let cache_id: String = row.try_get("cache_id")?;
    let user_token: Option<String> = row.try_get("user_token")?;
    let is_predefined: i64 = row.try_get("is_predefined")?;
    let created_at: i64 = row.try_get("created_at")?;

    Ok(CacheEntry {
        id: row.try_get("id")?,
        cache_id: cache_id
            .parse()
            .map_err(|e| StoreError::decode(format!("cache_id {cache_id:?}: {e}")))?,
        user_token: user_token
            .map(|t| {
                t.parse::<CallerToken>()
                    .map_err(|e| StoreError::decode(format!("user_token {t:?}: {e}")))
            })
            .transpose()?,
        api_path: row.try_get("api_path")?,
        response: row.try_get("response")?,
        is_predefined: is_predefined != 0,
        created_at: DateTime::from_timestamp_micros(created_at)
            .ok_or_else(|| StoreError::decode(format!("created_at out of range: {created_at}")))?,
    })
}

fn entries_from_rows(rows: &[AnyRow]) -> Result<Vec<CacheEntry>> {
    rows.iter().map(entry_from_row).collect()
}

#[async_trait]
impl CacheStore for SqlCacheStore {
    async fn insert(&self, entry: NewCacheEntry) -> Result<CacheEntry> {
        let id = self
            .run("insert", |conn| {
                let entry = entry.clone();
                Box::pin(async move {
                    let row = sqlx::query(
                        "INSERT INTO api_cache \
                         (cache_id, user_token, api_path, response, is_predefined, created_at) \
                         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
                    )
                    .bind(entry.cache_id().to_string())
                    .bind(entry.user_token().map(|t| t.to_string()))
                    .bind(entry.api_path().to_string())
                    .bind(entry.response().to_string())
                    .bind(i16::from(entry.is_predefined()))
                    .bind(to_micros(entry.created_at()))
                    .fetch_one(&mut *conn)
                    .await?;
                    row.try_get::<i64, _>(0)
                })
            })
            .await?;

        Ok(entry.into_entry(id))
    }

    async fn latest_by_path(
        &self,
        viewer: Option<&CallerToken>,
        api_path: &str,
    ) -> Result<Option<CacheEntry>> {
        let viewer = viewer.map(ToString::to_string);
        let api_path = api_path.to_string();

        let row = self
            .run("latest_by_path", |conn| {
                let viewer = viewer.clone();
                let api_path = api_path.clone();
                Box::pin(async move {
                    match viewer {
                        Some(token) => {
                            sqlx::query(LATEST_VISIBLE)
                                .bind(api_path)
                                .bind(token)
                                .fetch_optional(&mut *conn)
                                .await
                        }
                        None => {
                            sqlx::query(LATEST_PREDEFINED)
                                .bind(api_path)
                                .fetch_optional(&mut *conn)
                                .await
                        }
                    }
                })
            })
            .await?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn by_cache_id(&self, cache_id: &CacheId) -> Result<Option<CacheEntry>> {
        let cache_id = cache_id.to_string();

        let row = self
            .run("by_cache_id", |conn| {
                let cache_id = cache_id.clone();
                Box::pin(async move {
                    sqlx::query(BY_CACHE_ID)
                        .bind(cache_id)
                        .fetch_optional(&mut *conn)
                        .await
                })
            })
            .await?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn list_visible(&self, viewer: &CallerToken) -> Result<Vec<CacheEntry>> {
        let viewer = viewer.to_string();

        let rows = self
            .run("list_visible", |conn| {
                let viewer = viewer.clone();
                Box::pin(async move {
                    sqlx::query(LIST_VISIBLE)
                    .bind(viewer)
                    .fetch_all(&mut *conn)
                    .await
                })
            })
            .await?;

        entries_from_rows(&rows)
    }

    async fn delete_owned(&self, cache_id: &CacheId, owner: &CallerToken) -> Result<bool> {
        let cache_id = cache_id.to_string();
        let owner = owner.to_string();

        let affected = self
            .run("delete_owned", |conn| {
                let cache_id = cache_id.clone();
                let owner = owner.clone();
                Box::pin(async move {
                    sqlx::query(
                        "DELETE FROM api_cache \
                         WHERE cache_id = $1 AND user_token = $2 AND is_predefined = 0",
                    )
                    .bind(cache_id)
                    .bind(owner)
                    .execute(&mut *conn)
                    .await
                    .map(|done| done.rows_affected())
                })
            })
            .await?;

        Ok(affected > 0)
    }

    async fn predefined_exists(&self, api_path: &str) -> Result<bool> {
        let api_path = api_path.to_string();

        let row = self
            .run("predefined_exists", |conn| {
                let api_path = api_path.clone();
                Box::pin(async move {
                    sqlx::query(
                        "SELECT id FROM api_cache WHERE api_path = $1 AND is_predefined = 1 LIMIT 1",
                    )
                    .bind(api_path)
                    .fetch_optional(&mut *conn)
                    .await
                })
            })
            .await?;

        Ok(row.is_some())
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    fn backend(&self) -> &'static str {
        "sql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;
    use crate::schema::ensure_schema;
    use chrono::Duration;

    async fn store() -> SqlCacheStore {
        let pool = DatabasePool::connect("sqlite::memory:", &PoolConfig::single())
            .await
            .unwrap();
        ensure_schema(&pool).await.unwrap();
        SqlCacheStore::new(pool, RetryPolicy::no_retry())
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = store().await;
        let owner = CallerToken::generate();

        let a = store
            .insert(NewCacheEntry::owned(owner, "/api", "{}"))
            .await
            .unwrap();
        let b = store
            .insert(NewCacheEntry::owned(owner, "/api", "{}"))
            .await
            .unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn test_row_round_trip() {
        let store = store().await;
        let owner = CallerToken::generate();
        let stored = store
            .insert(NewCacheEntry::owned(owner, "/api/v1/pods", r#"{"kind":"PodList"}"#))
            .await
            .unwrap();

        let loaded = store.by_cache_id(&stored.cache_id).await.unwrap().unwrap();
        assert_eq!(loaded, stored);
        assert_eq!(loaded.user_token, Some(owner));
        assert!(!loaded.is_predefined);
    }

    #[tokio::test]
    async fn test_latest_by_path_follows_recency() {
        let store = store().await;
        let owner = CallerToken::generate();
        let base = Utc::now();

        store
            .insert(NewCacheEntry::predefined("/api/v1", "seed").with_created_at(base))
            .await
            .unwrap();
        store
            .insert(
                NewCacheEntry::owned(owner, "/api/v1", "mine")
                    .with_created_at(base + Duration::seconds(5)),
            )
            .await
            .unwrap();

        let hit = store
            .latest_by_path(Some(&owner), "/api/v1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.response, "mine");

        let anonymous = store.latest_by_path(None, "/api/v1").await.unwrap().unwrap();
        assert_eq!(anonymous.response, "seed");

        store
            .insert(
                NewCacheEntry::predefined("/api/v1", "reseeded")
                    .with_created_at(base + Duration::seconds(10)),
            )
            .await
            .unwrap();
        let hit = store
            .latest_by_path(Some(&owner), "/api/v1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.response, "reseeded");
    }

    #[tokio::test]
    async fn test_foreign_entries_are_invisible() {
        let store = store().await;
        let owner = CallerToken::generate();
        let other = CallerToken::generate();

        store
            .insert(NewCacheEntry::owned(other, "/apis", "theirs"))
            .await
            .unwrap();

        assert!(store
            .latest_by_path(Some(&owner), "/apis")
            .await
            .unwrap()
            .is_none());
        assert!(store.list_visible(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_visible_is_newest_first() {
        let store = store().await;
        let owner = CallerToken::generate();
        let base = Utc::now();

        for (i, path) in ["/api", "/apis", "/api/v1"].iter().enumerate() {
            store
                .insert(
                    NewCacheEntry::owned(owner, *path, "{}")
                        .with_created_at(base + Duration::seconds(i as i64)),
                )
                .await
                .unwrap();
        }
        store
            .insert(
                NewCacheEntry::predefined("/openapi/v2", "{}")
                    .with_created_at(base - Duration::seconds(1)),
            )
            .await
            .unwrap();

        let paths: Vec<_> = store
            .list_visible(&owner)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.api_path)
            .collect();
        assert_eq!(paths, ["/api/v1", "/apis", "/api", "/openapi/v2"]);
    }

    #[tokio::test]
    async fn test_delete_owned_only_touches_callers_rows() {
        let store = store().await;
        let owner = CallerToken::generate();
        let other = CallerToken::generate();

        let mine = store
            .insert(NewCacheEntry::owned(owner, "/api", "{}"))
            .await
            .unwrap();
        let seeded = store
            .insert(NewCacheEntry::predefined("/api", "{}"))
            .await
            .unwrap();

        assert!(!store.delete_owned(&mine.cache_id, &other).await.unwrap());
        assert!(!store.delete_owned(&seeded.cache_id, &owner).await.unwrap());
        assert!(store.delete_owned(&mine.cache_id, &owner).await.unwrap());
        assert!(store.by_cache_id(&mine.cache_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_predefined_exists() {
        let store = store().await;
        assert!(!store.predefined_exists("/api").await.unwrap());

        store
            .insert(NewCacheEntry::owned(CallerToken::generate(), "/api", "{}"))
            .await
            .unwrap();
        assert!(!store.predefined_exists("/api").await.unwrap());

        store
            .insert(NewCacheEntry::predefined("/api", "{}"))
            .await
            .unwrap();
        assert!(store.predefined_exists("/api").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_table_is_not_retried() {
        let pool = DatabasePool::connect("sqlite::memory:", &PoolConfig::single())
            .await
            .unwrap();
        let store = SqlCacheStore::new(pool, RetryPolicy::with_defaults());

        let err = store.by_cache_id(&CacheId::generate()).await.unwrap_err();
        assert!(matches!(err, StoreError::Execution(_)));
    }
}
