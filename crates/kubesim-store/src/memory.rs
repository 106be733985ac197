//! Process-local backend for development and tests.

use crate::error::Result;
use crate::store::CacheStore;
use async_trait::async_trait;
use kubesim_core::{newest_first, select_latest, CacheEntry, CacheId, CallerToken, NewCacheEntry};
use parking_lot::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<CacheEntry>,
    next_id: i64,
}

/// In-memory cache store.
///
/// Unbounded by default. With [`MemoryCacheStore::with_max_entries`] the
/// oldest owned entries are evicted once the cap is exceeded; predefined
/// entries are never evicted and do not count towards it.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    inner: RwLock<Inner>,
    max_owned: Option<usize>,
}

impl MemoryCacheStore {
    /// Create an empty, unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max` owned entries.
    #[must_use]
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_owned = Some(max.max(1));
        self
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn insert(&self, entry: NewCacheEntry) -> Result<CacheEntry> {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let entry = entry.into_entry(inner.next_id);
        inner.entries.push(entry.clone());

        if let Some(max) = self.max_owned {
            let owned = inner.entries.iter().filter(|e| !e.is_predefined).count();
            if owned > max {
                // Entries are kept in insertion order, so the first owned ones are the oldest
                let mut excess = owned - max;
                inner.entries.retain(|e| {
                    if excess > 0 && !e.is_predefined {
                        excess -= 1;
                        false
                    } else {
                        true
                    }
                });
                debug!(max, "Evicted oldest owned cache entries");
            }
        }

        Ok(entry)
    }

    async fn latest_by_path(
        &self,
        viewer: Option<&CallerToken>,
        api_path: &str,
    ) -> Result<Option<CacheEntry>> {
        let inner = self.inner.read();
        Ok(select_latest(&inner.entries, viewer, api_path).cloned())
    }

    async fn by_cache_id(&self, cache_id: &CacheId) -> Result<Option<CacheEntry>> {
        let inner = self.inner.read();
        Ok(inner.entries.iter().find(|e| &e.cache_id == cache_id).cloned())
    }

    async fn list_visible(&self, viewer: &CallerToken) -> Result<Vec<CacheEntry>> {
        let inner = self.inner.read();
        let mut visible: Vec<CacheEntry> = inner
            .entries
            .iter()
            .filter(|e| e.is_visible_to(Some(viewer)))
            .cloned()
            .collect();
        visible.sort_by(newest_first);
        Ok(visible)
    }

    async fn delete_owned(&self, cache_id: &CacheId, owner: &CallerToken) -> Result<bool> {
        let mut inner = self.inner.write();
        let before = inner.entries.len();
        inner.entries.retain(|e| {
            !(&e.cache_id == cache_id && !e.is_predefined && e.user_token.as_ref() == Some(owner))
        });
        Ok(inner.entries.len() < before)
    }

    async fn predefined_exists(&self, api_path: &str) -> Result<bool> {
        let inner = self.inner.read();
        Ok(inner
            .entries
            .iter()
            .any(|e| e.is_predefined && e.api_path == api_path))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let store = MemoryCacheStore::new();
        let owner = CallerToken::generate();

        let a = store.insert(NewCacheEntry::owned(owner, "/api", "1")).await.unwrap();
        let b = store.insert(NewCacheEntry::owned(owner, "/api", "2")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_cap_evicts_oldest_owned_entries_only() {
        let store = MemoryCacheStore::new().with_max_entries(2);
        let owner = CallerToken::generate();

        store
            .insert(NewCacheEntry::predefined("/api", "seed"))
            .await
            .unwrap();
        let first = store.insert(NewCacheEntry::owned(owner, "/api/v1", "1")).await.unwrap();
        store.insert(NewCacheEntry::owned(owner, "/api/v1", "2")).await.unwrap();
        store.insert(NewCacheEntry::owned(owner, "/api/v1", "3")).await.unwrap();

        assert_eq!(store.len(), 3);
        assert!(store.by_cache_id(&first.cache_id).await.unwrap().is_none());
        assert!(store.predefined_exists("/api").await.unwrap());

        let latest = store
            .latest_by_path(Some(&owner), "/api/v1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.response, "3");
    }

    #[tokio::test]
    async fn test_same_timestamp_prefers_later_insert() {
        let store = MemoryCacheStore::new();
        let owner = CallerToken::generate();
        let at = chrono::Utc::now();

        store
            .insert(NewCacheEntry::owned(owner, "/api", "first").with_created_at(at))
            .await
            .unwrap();
        store
            .insert(NewCacheEntry::owned(owner, "/api", "second").with_created_at(at))
            .await
            .unwrap();

        let hit = store
            .latest_by_path(Some(&owner), "/api")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.response, "second");
    }

    #[tokio::test]
    async fn test_delete_owned_keeps_predefined() {
        let store = MemoryCacheStore::new();
        let owner = CallerToken::generate();
        let seeded = store
            .insert(NewCacheEntry::predefined("/api", "{}"))
            .await
            .unwrap();

        assert!(!store.delete_owned(&seeded.cache_id, &owner).await.unwrap());
        assert!(store.predefined_exists("/api").await.unwrap());
    }
}
