//! Storage backend abstraction.

use crate::error::Result;
use async_trait::async_trait;
use kubesim_core::{CacheEntry, CacheId, CallerToken, NewCacheEntry};

/// Raw persistence operations.
///
/// Backends only move rows. Ownership checks, precedence and error mapping
/// live in [`crate::CacheService`].
#[async_trait]
pub trait CacheStore: Send + Sync + std::fmt::Debug {
    /// Persist a new entry and return it with its assigned `id`.
    async fn insert(&self, entry: NewCacheEntry) -> Result<CacheEntry>;

    /// Newest entry for `api_path` that `viewer` owns or that is predefined.
    /// With no viewer only predefined entries qualify.
    async fn latest_by_path(
        &self,
        viewer: Option<&CallerToken>,
        api_path: &str,
    ) -> Result<Option<CacheEntry>>;

    /// Look up an entry by external id, regardless of owner.
    async fn by_cache_id(&self, cache_id: &CacheId) -> Result<Option<CacheEntry>>;

    /// Every entry `viewer` owns plus every predefined entry, newest first.
    async fn list_visible(&self, viewer: &CallerToken) -> Result<Vec<CacheEntry>>;

    /// Remove a non-predefined entry owned by `owner`.
    /// Returns whether a row was removed.
    async fn delete_owned(&self, cache_id: &CacheId, owner: &CallerToken) -> Result<bool>;

    /// Whether a predefined entry exists for exactly this path.
    async fn predefined_exists(&self, api_path: &str) -> Result<bool>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;

    /// Backend name for logs and health output.
    fn backend(&self) -> &'static str;
}
