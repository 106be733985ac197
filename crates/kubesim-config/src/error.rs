//! Configuration errors.

use std::path::PathBuf;

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("Failed to access {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File content did not parse
    #[error("Failed to parse {path}: {message}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Extension not one of yaml, yml, toml, json
    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// An environment override had an unusable value
    #[error("Invalid value for {key}: {message}")]
    Env {
        /// Variable name
        key: String,
        /// Reason
        message: String,
    },

    /// Values parsed but are inconsistent or out of range
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

impl ConfigError {
    pub(crate) fn env(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Env {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
