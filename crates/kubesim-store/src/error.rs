//! Store error types.

use kubesim_core::SimError;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Driver messages that mean the connection went away underneath us.
const DROPPED_CONNECTION_SIGNATURES: &[&str] = &[
    "SSL connection has been closed unexpectedly",
    "connection already closed",
    "server closed the connection unexpectedly",
    "connection reset by peer",
    "broken pipe",
];

fn looks_like_dropped_connection(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    DROPPED_CONNECTION_SIGNATURES
        .iter()
        .any(|sig| lower.contains(&sig.to_ascii_lowercase()))
}

/// Store error type.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connection dropped mid-operation. The only retryable class.
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Pool exhausted or closed.
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// SQL execution error.
    #[error("SQL execution error: {0}")]
    Execution(String),

    /// A stored row could not be turned into an entry.
    #[error("Corrupt cache row: {0}")]
    Decode(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if the error is worth retrying.
    ///
    /// Pool timeouts are not: waiting longer on an exhausted pool only adds
    /// load.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(e) => Self::Connection(e.to_string()),
            sqlx::Error::PoolTimedOut => Self::Pool("Connection pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::Pool("Connection pool is closed".to_string()),
            sqlx::Error::Configuration(e) => Self::Config(e.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::Decode(err.to_string())
            }
            other => {
                let message = other.to_string();
                if looks_like_dropped_connection(&message) {
                    Self::Connection(message)
                } else {
                    Self::Execution(message)
                }
            }
        }
    }
}

impl From<StoreError> for SimError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connection(msg) => Self::transient_store(msg),
            StoreError::Config(msg) => Self::configuration(msg),
            other => Self::store(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connection_errors_are_transient() {
        assert!(StoreError::connection("dropped").is_transient());
        assert!(!StoreError::Pool("timed out".to_string()).is_transient());
        assert!(!StoreError::execution("syntax error").is_transient());
        assert!(!StoreError::decode("bad uuid").is_transient());
    }

    #[test]
    fn test_pool_timeout_is_not_transient() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Pool(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_io_errors_are_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(StoreError::from(sqlx::Error::Io(io)).is_transient());
    }

    #[test]
    fn test_dropped_connection_signatures() {
        let err = StoreError::from(sqlx::Error::Protocol(
            "SSL connection has been closed unexpectedly".to_string(),
        ));
        assert!(err.is_transient());

        let err = StoreError::from(sqlx::Error::Protocol(
            "unexpected message type".to_string(),
        ));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_conversion_to_sim_error() {
        let sim: SimError = StoreError::connection("connection already closed").into();
        assert!(sim.is_transient());
        assert_eq!(sim.status_code(), 500);

        let sim: SimError = StoreError::execution("no such table").into();
        assert!(!sim.is_transient());
    }
}
