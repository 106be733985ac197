//! Per-request deadlines.
//!
//! A deadline only bounds how long the caller waits. The future it wraps is
//! dropped when time runs out; any work that future already handed off
//! elsewhere keeps running.

use kubesim_core::{SimError, SimResult};
use std::future::Future;
use std::time::Duration;

/// Optional wall-clock bound for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline {
    timeout: Option<Duration>,
}

impl Deadline {
    /// No deadline
    #[must_use]
    pub fn none() -> Self {
        Self { timeout: None }
    }

    /// Deadline after the given duration
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// Parse a `timeout` query value expressed in seconds.
    ///
    /// Fractions are accepted. Zero, negative and non-numeric values are
    /// rejected.
    pub fn parse_seconds(raw: &str) -> SimResult<Self> {
        let seconds: f64 = raw
            .trim()
            .parse()
            .map_err(|_| SimError::validation(format!("Invalid timeout value: {raw}")))?;

        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(SimError::validation(format!(
                "Timeout must be a positive number of seconds, got {raw}"
            )));
        }

        Duration::try_from_secs_f64(seconds)
            .map(Self::after)
            .map_err(|_| SimError::validation(format!("Timeout out of range: {raw}")))
    }

    /// Build from an optional raw query value
    pub fn from_query(raw: Option<&str>) -> SimResult<Self> {
        raw.map_or_else(|| Ok(Self::none()), Self::parse_seconds)
    }

    /// Configured bound, if any
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Await `fut`, failing with [`SimError::Timeout`] once the deadline passes
    pub async fn run<F, T>(&self, fut: F) -> SimResult<T>
    where
        F: Future<Output = SimResult<T>>,
    {
        match self.timeout {
            None => fut.await,
            Some(after) => tokio::time::timeout(after, fut)
                .await
                .map_err(|_| SimError::timeout(after))?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        assert_eq!(
            Deadline::parse_seconds("1").unwrap().timeout(),
            Some(Duration::from_secs(1))
        );
        assert_eq!(
            Deadline::parse_seconds("0.5").unwrap().timeout(),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        for raw in ["0", "-3", "abc", "", "NaN", "inf"] {
            let err = Deadline::parse_seconds(raw).unwrap_err();
            assert_eq!(err.status_code(), 400, "value {raw:?}");
        }
    }

    #[test]
    fn test_from_query_absent() {
        assert_eq!(Deadline::from_query(None).unwrap(), Deadline::none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_deadline_times_out() {
        let deadline = Deadline::after(Duration::from_secs(1));
        let result: SimResult<()> = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;

        assert_eq!(
            result.unwrap_err(),
            SimError::timeout(Duration::from_secs(1))
        );
    }

    #[tokio::test]
    async fn test_fast_operation_passes_through() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let value = deadline.run(async { Ok(3) }).await.unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_inner_error_is_preserved() {
        let result: SimResult<()> = Deadline::none()
            .run(async { Err(SimError::generation("not json")) })
            .await;
        assert_eq!(result.unwrap_err().status_code(), 500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_deadlines_are_independent() {
        let short = Deadline::after(Duration::from_secs(1));
        let long = Deadline::after(Duration::from_secs(10));

        let (a, b) = tokio::join!(
            short.run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }),
            long.run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }),
        );

        assert!(a.is_err());
        assert!(b.is_ok());
    }
}
