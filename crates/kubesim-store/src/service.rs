//! Cache operations as callers see them.
//!
//! This is where ownership and visibility are enforced and where backend
//! errors become [`SimError`]s. Backends stay dumb.

use crate::store::CacheStore;
use kubesim_core::{CacheEntry, CacheId, CallerToken, NewCacheEntry, SimError, SimResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    /// Entries written
    pub inserted: usize,
    /// Paths that already had a predefined entry
    pub skipped: usize,
}

/// Cache service.
#[derive(Debug, Clone)]
pub struct CacheService {
    store: Arc<dyn CacheStore>,
}

impl CacheService {
    /// Wrap a backend.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Backend name.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Store a caller-owned response and return its id.
    ///
    /// `is_predefined` is what the caller asked for. Asking for `true` is
    /// refused: only [`CacheService::seed_predefined`] creates predefined
    /// entries.
    pub async fn store(
        &self,
        owner: CallerToken,
        api_path: &str,
        response: String,
        is_predefined: bool,
    ) -> SimResult<CacheId> {
        if is_predefined {
            return Err(SimError::forbidden(
                "Callers cannot create predefined cache entries",
            ));
        }
        if api_path.trim().is_empty() {
            return Err(SimError::validation("api_path must not be empty"));
        }

        let entry = self
            .store
            .insert(NewCacheEntry::owned(owner, api_path, response))
            .await?;

        debug!(cache_id = %entry.cache_id, api_path, "Stored cache entry");
        Ok(entry.cache_id)
    }

    /// Newest entry for `api_path` that `owner` owns or that is predefined.
    pub async fn fetch_latest_by_path(
        &self,
        owner: &CallerToken,
        api_path: &str,
    ) -> SimResult<CacheEntry> {
        self.fetch_latest_by_path_or_predefined(Some(owner), api_path)
            .await
    }

    /// Same precedence as [`CacheService::fetch_latest_by_path`], but an
    /// absent token matches predefined entries only.
    pub async fn fetch_latest_by_path_or_predefined(
        &self,
        owner: Option<&CallerToken>,
        api_path: &str,
    ) -> SimResult<CacheEntry> {
        self.store
            .latest_by_path(owner, api_path)
            .await?
            .ok_or_else(|| SimError::not_found(format!("cache entry for {api_path}")))
    }

    /// Entry with the given id, if `owner` may see it.
    ///
    /// Entries owned by someone else are reported as missing so their
    /// existence is not disclosed.
    pub async fn fetch_by_id(&self, cache_id: &CacheId, owner: &CallerToken) -> SimResult<CacheEntry> {
        self.store
            .by_cache_id(cache_id)
            .await?
            .filter(|entry| entry.is_visible_to(Some(owner)))
            .ok_or_else(|| SimError::not_found(format!("cache entry {cache_id}")))
    }

    /// Everything `owner` may see, newest first.
    pub async fn fetch_all(&self, owner: &CallerToken) -> SimResult<Vec<CacheEntry>> {
        Ok(self.store.list_visible(owner).await?)
    }

    /// Delete an entry owned by `owner`.
    pub async fn delete(&self, cache_id: &CacheId, owner: &CallerToken) -> SimResult<()> {
        let entry = self
            .store
            .by_cache_id(cache_id)
            .await?
            .ok_or_else(|| SimError::not_found(format!("cache entry {cache_id}")))?;

        entry.ensure_deletable_by(owner)?;

        if !self.store.delete_owned(cache_id, owner).await? {
            // Removed by a concurrent request between lookup and delete
            return Err(SimError::not_found(format!("cache entry {cache_id}")));
        }

        debug!(%cache_id, "Deleted cache entry");
        Ok(())
    }

    /// Insert predefined entries for paths that do not have one yet.
    pub async fn seed_predefined<I>(&self, entries: I) -> SimResult<SeedReport>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut report = SeedReport::default();

        for (api_path, response) in entries {
            if self.store.predefined_exists(&api_path).await? {
                debug!(%api_path, "Predefined entry already present");
                report.skipped += 1;
                continue;
            }
            self.store
                .insert(NewCacheEntry::predefined(api_path, response))
                .await?;
            report.inserted += 1;
        }

        info!(
            inserted = report.inserted,
            skipped = report.skipped,
            "Predefined cache seeded"
        );
        Ok(report)
    }

    /// Liveness probe for the backend.
    pub async fn ping(&self) -> SimResult<()> {
        Ok(self.store.ping().await?)
    }
}
