//! Cache entry record and the visibility/precedence rule.
//!
//! An entry is visible to a caller when the caller owns it or when it is
//! predefined. Among the visible entries for one path the newest wins: recency
//! decides, predefined status never does. Ties on `created_at` fall back to the
//! store-assigned `id`, so the order is total.
//!
//! The SQL store expresses the same rule as
//! `WHERE api_path = ? AND (user_token = ? OR is_predefined) ORDER BY created_at DESC, id DESC`;
//! [`select_latest`] is the in-process form used by the memory store and tests.

use crate::error::SimError;
use crate::types::{CacheId, CallerToken};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A stored simulated response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Store-assigned monotonic id. Internal only.
    pub id: i64,
    /// External id
    pub cache_id: CacheId,
    /// Owner; `None` only for predefined entries
    pub user_token: Option<CallerToken>,
    /// Simulated API path this response answers
    pub api_path: String,
    /// Serialized payload, returned verbatim
    pub response: String,
    /// Seeded by the operator
    pub is_predefined: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether `viewer` may see this entry. Anonymous viewers only see predefined entries.
    #[must_use]
    pub fn is_visible_to(&self, viewer: Option<&CallerToken>) -> bool {
        self.is_predefined || (viewer.is_some() && self.user_token.as_ref() == viewer)
    }

    /// Check that `caller` may delete this entry.
    pub fn ensure_deletable_by(&self, caller: &CallerToken) -> Result<(), SimError> {
        if self.is_predefined {
            return Err(SimError::forbidden("Predefined cache entries cannot be deleted"));
        }
        if self.user_token.as_ref() != Some(caller) {
            return Err(SimError::forbidden("Cache entry belongs to another caller"));
        }
        Ok(())
    }
}

/// Ordering that puts the most recent entry first.
#[must_use]
pub fn newest_first(a: &CacheEntry, b: &CacheEntry) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Pick the entry `viewer` should get for `api_path`.
pub fn select_latest<'a, I>(
    entries: I,
    viewer: Option<&CallerToken>,
    api_path: &str,
) -> Option<&'a CacheEntry>
where
    I: IntoIterator<Item = &'a CacheEntry>,
{
    entries
        .into_iter()
        .filter(|e| e.api_path == api_path && e.is_visible_to(viewer))
        .min_by(|a, b| newest_first(a, b))
}

/// An entry that has not been written yet.
///
/// Fields are private so the predefined flag can only come from
/// [`NewCacheEntry::predefined`], which the seeding routine uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCacheEntry {
    cache_id: CacheId,
    user_token: Option<CallerToken>,
    api_path: String,
    response: String,
    is_predefined: bool,
    created_at: DateTime<Utc>,
}

impl NewCacheEntry {
    /// Entry owned by a caller
    pub fn owned(
        owner: CallerToken,
        api_path: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            cache_id: CacheId::generate(),
            user_token: Some(owner),
            api_path: api_path.into(),
            response: response.into(),
            is_predefined: false,
            created_at: stored_precision(Utc::now()),
        }
    }

    /// Operator-seeded entry, visible to everyone
    pub fn predefined(api_path: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            cache_id: CacheId::generate(),
            user_token: None,
            api_path: api_path.into(),
            response: response.into(),
            is_predefined: true,
            created_at: stored_precision(Utc::now()),
        }
    }

    /// Override the creation time
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = stored_precision(created_at);
        self
    }

    /// External id
    #[must_use]
    pub fn cache_id(&self) -> CacheId {
        self.cache_id
    }

    /// Owner
    #[must_use]
    pub fn user_token(&self) -> Option<CallerToken> {
        self.user_token
    }

    /// Path
    #[must_use]
    pub fn api_path(&self) -> &str {
        &self.api_path
    }

    /// Payload
    #[must_use]
    pub fn response(&self) -> &str {
        &self.response
    }

    /// Predefined flag
    #[must_use]
    pub fn is_predefined(&self) -> bool {
        self.is_predefined
    }

    /// Creation time
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Attach the store-assigned id
    #[must_use]
    pub fn into_entry(self, id: i64) -> CacheEntry {
        CacheEntry {
            id,
            cache_id: self.cache_id,
            user_token: self.user_token,
            api_path: self.api_path,
            response: self.response,
            is_predefined: self.is_predefined,
            created_at: self.created_at,
        }
    }
}

/// Timestamps are kept at microsecond precision, the finest every backend stores.
fn stored_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}
