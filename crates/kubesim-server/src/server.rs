//! HTTP server lifecycle.

use kubesim_config::ServerSettings;
use kubesim_core::{SimError, SimResult};
use kubesim_resilience::RateLimiter;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{routes::create_router, shutdown::ShutdownTrigger, state::AppState};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Time allowed for in-flight requests once shutdown starts
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            shutdown_grace: settings.shutdown_grace,
        }
    }
}

impl ServerConfig {
    /// Create a configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the shutdown grace period
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// `host:port`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The simulator's HTTP server
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a server
    #[must_use]
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Bind the configured address and serve until `signal` resolves
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound or the server fails
    pub async fn run<F>(self, signal: F) -> SimResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| SimError::configuration(format!("Failed to bind {addr}: {e}")))?;
        self.serve(listener, signal).await
    }

    /// Serve on an existing listener until `signal` resolves.
    ///
    /// In-flight requests get the grace period to finish; anything still
    /// running after that is dropped.
    ///
    /// # Errors
    /// Returns an error if the server fails
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> SimResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(address = %addr, "Server listening");
        }

        let trigger = ShutdownTrigger::new();
        let forward = {
            let trigger = trigger.clone();
            tokio::spawn(async move {
                signal.await;
                trigger.trigger("signal");
            })
        };
        let sweeper = spawn_sweeper(Arc::clone(&self.state.limiter), &trigger);

        let app = create_router(self.state);
        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(trigger.wait())
        .into_future();

        let grace = self.config.shutdown_grace;
        let grace_expired = {
            let wait = trigger.wait();
            async move {
                wait.await;
                tokio::time::sleep(grace).await;
            }
        };

        let result = tokio::select! {
            result = server => result.map_err(|e| SimError::internal(format!("Server error: {e}"))),
            () = grace_expired => {
                warn!(grace_secs = grace.as_secs(), "Shutdown grace period expired, dropping connections");
                Ok(())
            }
        };

        forward.abort();
        sweeper.abort();
        info!("Server stopped");
        result
    }
}

/// Periodically drop idle rate limit windows until shutdown
fn spawn_sweeper(limiter: Arc<RateLimiter>, trigger: &ShutdownTrigger) -> JoinHandle<()> {
    let period = limiter.config().window.max(Duration::from_secs(1));
    let stop = trigger.wait();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        tokio::pin!(stop);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = limiter.sweep();
                    if removed > 0 {
                        debug!(removed, tracked = limiter.tracked_keys(), "Swept rate limit windows");
                    }
                }
                () = &mut stop => break,
            }
        }
    })
}
