//! Seed file for predefined cache entries.
//!
//! ```json
//! {"entries": [{"api_path": "/api/v1", "response": {"kind": "APIResourceList"}}]}
//! ```

use crate::config::SeedSettings;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

/// One predefined response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedEntry {
    /// Path the response answers
    pub api_path: String,
    /// Response body
    pub response: Value,
}

/// Seed file content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedFile {
    /// Entries in file order
    #[serde(default)]
    pub entries: Vec<SeedEntry>,
}

impl SeedFile {
    /// Parse seed JSON
    pub fn from_json(path: &Path, content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Read a seed file
    pub async fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(path, &content)
    }

    /// Write as pretty JSON
    pub async fn write(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        tokio::fs::write(path, content)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(api_path, serialized response)` pairs ready for storage
    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.entries
            .into_iter()
            .map(|entry| (entry.api_path, entry.response.to_string()))
            .collect()
    }
}

/// Load the configured seed file.
///
/// A missing file yields an empty seed unless `settings.required` is set.
pub async fn load_seed(settings: &SeedSettings) -> Result<SeedFile, ConfigError> {
    match SeedFile::read(&settings.path).await {
        Ok(seed) => {
            info!(path = %settings.path.display(), entries = seed.len(), "Loaded seed file");
            Ok(seed)
        }
        Err(ConfigError::Io { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound && !settings.required =>
        {
            warn!(path = %settings.path.display(), "Seed file not found, no predefined entries loaded");
            Ok(SeedFile::default())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_into_pairs_serializes_every_response() {
        let seed = SeedFile::from_json(
            Path::new("seed.json"),
            r#"{"entries": [
                {"api_path": "/api", "response": {"kind": "APIVersions", "versions": ["v1"]}},
                {"api_path": "/healthz", "response": "ok"}
            ]}"#,
        )
        .unwrap();

        let pairs = seed.into_pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, "/api");
        assert_eq!(
            serde_json::from_str::<Value>(&pairs[0].1).unwrap(),
            json!({"kind": "APIVersions", "versions": ["v1"]})
        );
        assert_eq!(pairs[1].1, "\"ok\"");
    }

    #[test]
    fn test_malformed_json() {
        let err = SeedFile::from_json(Path::new("seed.json"), "{\"entries\": [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_missing_optional_file_is_empty() {
        let settings = SeedSettings {
            path: PathBuf::from("/nonexistent/predefined_cache.json"),
            required: false,
        };
        assert!(load_seed(&settings).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_required_file_fails() {
        let settings = SeedSettings {
            path: PathBuf::from("/nonexistent/predefined_cache.json"),
            required: true,
        };
        assert!(matches!(
            load_seed(&settings).await,
            Err(ConfigError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predefined_cache.json");
        let seed = SeedFile {
            entries: vec![SeedEntry {
                api_path: "/api/v1".to_string(),
                response: json!({"kind": "APIResourceList", "resources": []}),
            }],
        };
        seed.write(&path).await.unwrap();

        let settings = SeedSettings {
            path,
            required: true,
        };
        assert_eq!(load_seed(&settings).await.unwrap(), seed);
    }
}
