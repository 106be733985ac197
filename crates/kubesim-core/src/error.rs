//! Error taxonomy for the simulator.
//!
//! Every failure a request can hit is one of these variants. Each variant maps
//! to exactly one HTTP status, so handlers never pick status codes themselves.

use std::time::Duration;

/// Result alias used across the workspace
pub type SimResult<T> = Result<T, SimError>;

/// Simulator error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// Request failed local validation (bad content type, bad JSON, bad timeout)
    #[error("Validation error: {message}")]
    Validation {
        /// Human readable reason
        message: String,
    },

    /// Missing or malformed credentials
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Human readable reason
        message: String,
    },

    /// Caller is known but not allowed to perform the operation
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Human readable reason
        message: String,
    },

    /// Requested resource does not exist or is not visible to the caller
    #[error("Not found: {resource}")]
    NotFound {
        /// Description of the missing resource
        resource: String,
    },

    /// Caller exceeded one of the admission quotas
    #[error("Rate limit exceeded for {scope}")]
    RateLimited {
        /// Which quota was exhausted (`token` or `ip`)
        scope: String,
        /// Time until the quota frees a slot
        retry_after: Duration,
    },

    /// Caller-supplied deadline elapsed
    #[error("Request timed out after {after:?}")]
    Timeout {
        /// The deadline that elapsed
        after: Duration,
    },

    /// Backing store connection dropped; safe to retry
    #[error("Transient store error: {message}")]
    TransientStore {
        /// Driver message
        message: String,
    },

    /// Backing store failure that retrying will not fix
    #[error("Store error: {message}")]
    Store {
        /// Driver message
        message: String,
    },

    /// The generation collaborator failed or returned unusable output
    #[error("Generation error: {message}")]
    Generation {
        /// Reason
        message: String,
    },

    /// Invalid configuration detected at startup
    #[error("Configuration error: {message}")]
    Configuration {
        /// Reason
        message: String,
    },

    /// Anything else
    #[error("Internal error: {message}")]
    Internal {
        /// Reason
        message: String,
    },
}

impl SimError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a rate limit error
    pub fn rate_limited(scope: impl Into<String>, retry_after: Duration) -> Self {
        Self::RateLimited {
            scope: scope.into(),
            retry_after,
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout { after }
    }

    /// Create a transient store error
    pub fn transient_store(message: impl Into<String>) -> Self {
        Self::TransientStore {
            message: message.into(),
        }
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Timeout { .. } => 408,
            Self::RateLimited { .. } => 429,
            Self::TransientStore { .. }
            | Self::Store { .. }
            | Self::Generation { .. }
            | Self::Configuration { .. }
            | Self::Internal { .. } => 500,
        }
    }

    /// Whether the caller caused this error
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Whether a retry can succeed without any change on the caller's side
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStore { .. })
    }

    /// Short machine readable tag, used for metrics labels
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout { .. } => "timeout",
            Self::TransientStore { .. } => "transient_store",
            Self::Store { .. } => "store",
            Self::Generation { .. } => "generation",
            Self::Configuration { .. } => "configuration",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {err}"))
    }
}
