//! Validated identifier newtypes.

use crate::error::SimError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of a caller: the UUID carried in `Authorization: Bearer <uuid>`.
///
/// Cache entries are partitioned by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerToken(Uuid);

impl CallerToken {
    /// Wrap an existing UUID
    #[must_use]
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a random token
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse the value of an `Authorization` header.
    ///
    /// Only the `Bearer` scheme is accepted and the credential must be a UUID.
    pub fn from_authorization(header: &str) -> Result<Self, SimError> {
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| SimError::unauthorized("Invalid Authorization format. Expected: Bearer <token>"))?
            .trim();

        if token.is_empty() {
            return Err(SimError::unauthorized("Empty bearer token"));
        }

        token
            .parse()
            .map_err(|_| SimError::unauthorized("Bearer token must be a valid UUID"))
    }

    /// Underlying UUID
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for CallerToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for CallerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Externally visible identifier of a cache entry.
///
/// Assigned once when the entry is built and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheId(Uuid);

impl CacheId {
    /// Generate a fresh random id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    #[must_use]
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Underlying UUID
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for CacheId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_parsing() {
        let uuid = Uuid::new_v4();
        let token = CallerToken::from_authorization(&format!("Bearer {uuid}")).unwrap();
        assert_eq!(token.as_uuid(), &uuid);
    }

    #[test]
    fn test_bearer_rejects_other_schemes() {
        let uuid = Uuid::new_v4();
        let err = CallerToken::from_authorization(&format!("Basic {uuid}")).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_bearer_rejects_non_uuid() {
        assert!(CallerToken::from_authorization("Bearer sk-abc123").is_err());
        assert!(CallerToken::from_authorization("Bearer ").is_err());
        assert!(CallerToken::from_authorization("").is_err());
    }

    #[test]
    fn test_cache_ids_are_unique() {
        let a = CacheId::generate();
        let b = CacheId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_cache_id_round_trips_through_string() {
        let id = CacheId::generate();
        let parsed: CacheId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<CacheId>().is_err());
    }
}
