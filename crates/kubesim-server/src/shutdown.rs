//! Graceful shutdown handling.
//!
//! A [`ShutdownTrigger`] fans a single signal out to the HTTP server and the
//! background tasks it owns.

use std::future::Future;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Sender side of the shutdown broadcast
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl Default for ShutdownTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownTrigger {
    /// Create a trigger that has not fired
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Fire the trigger. Idempotent.
    pub fn trigger(&self, reason: &str) {
        if !*self.tx.borrow() {
            info!(reason = %reason, "Initiating graceful shutdown");
        }
        self.tx.send_replace(true);
    }

    /// Whether shutdown has started
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Future resolving once the trigger fires
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // A dropped sender also ends the wait
            let _ = rx.wait_for(|fired| *fired).await;
        }
    }
}

/// Resolve on Ctrl+C or SIGTERM, returning the signal name
///
/// # Panics
/// Panics if signal handlers cannot be installed
#[allow(clippy::expect_used)]
pub async fn shutdown_signal() -> String {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        "ctrl+c"
    };

    #[cfg(unix)]
    let sigterm = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
        "sigterm"
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<&str>();

    let signal_name = tokio::select! {
        name = ctrl_c => name,
        name = sigterm => name,
    };

    info!(signal = signal_name, "Received shutdown signal");
    signal_name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_waiters() {
        let trigger = ShutdownTrigger::new();
        assert!(!trigger.is_triggered());

        let waiter = tokio::spawn(trigger.wait());
        trigger.trigger("test");

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert!(trigger.is_triggered());
    }

    #[tokio::test]
    async fn test_wait_after_trigger_resolves_immediately() {
        let trigger = ShutdownTrigger::new();
        trigger.trigger("first");
        trigger.trigger("second");

        tokio::time::timeout(Duration::from_millis(100), trigger.wait())
            .await
            .expect("already triggered");
    }
}
