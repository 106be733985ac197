//! Dual sliding-window admission control.
//!
//! Two independent windows are kept: one per caller token and one per source
//! IP. A request is admitted only when both windows have room, and it is then
//! recorded in both. The purge, check and record steps run under one lock so
//! concurrent callers never observe one window updated without the other.
//!
//! State is process local and is lost on restart.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Rate limit configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether admission control is applied at all
    pub enabled: bool,
    /// Requests admitted per key within one window
    pub max_requests: usize,
    /// Window length
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 5,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// Config with the given limit and the default window
    #[must_use]
    pub fn per_minute(max_requests: usize) -> Self {
        Self {
            max_requests,
            ..Default::default()
        }
    }
}

/// Which quota rejected a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitScope {
    /// Per caller token
    Token,
    /// Per source address
    Ip,
}

impl RateLimitScope {
    /// Label used in responses and metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Ip => "ip",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Request admitted and recorded
    Allowed,
    /// Request rejected; nothing was recorded
    Rejected {
        /// Exhausted quota
        scope: RateLimitScope,
        /// Time until the oldest recorded request leaves the window
        retry_after: Duration,
    },
}

impl Admission {
    /// Whether the request was admitted
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

#[derive(Debug, Default)]
struct Windows {
    by_token: HashMap<String, VecDeque<Instant>>,
    by_ip: HashMap<String, VecDeque<Instant>>,
}

/// Drop timestamps that fell out of the window.
fn purge(window: &mut VecDeque<Instant>, now: Instant, length: Duration) {
    while let Some(oldest) = window.front() {
        if now.saturating_duration_since(*oldest) >= length {
            window.pop_front();
        } else {
            break;
        }
    }
}

fn retry_after(window: &VecDeque<Instant>, now: Instant, length: Duration) -> Duration {
    window
        .front()
        .map_or(Duration::ZERO, |oldest| {
            length.saturating_sub(now.saturating_duration_since(*oldest))
        })
}

/// In-memory token and IP rate limiter
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    /// Create a limiter
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(Windows::default()),
        }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or reject a request from `token` at `ip`
    #[must_use]
    pub fn is_allowed(&self, token: &str, ip: &str) -> bool {
        self.check(token, ip).is_allowed()
    }

    /// Admission check with rejection details
    #[must_use]
    pub fn check(&self, token: &str, ip: &str) -> Admission {
        self.check_at(token, ip, Instant::now())
    }

    /// Admission check against an explicit clock reading
    #[must_use]
    pub fn check_at(&self, token: &str, ip: &str, now: Instant) -> Admission {
        if !self.config.enabled {
            return Admission::Allowed;
        }

        let limit = self.config.max_requests;
        let length = self.config.window;
        let mut windows = self.windows.lock();
        let Windows { by_token, by_ip } = &mut *windows;

        let token_window = by_token.entry(token.to_owned()).or_default();
        purge(token_window, now, length);
        let ip_window = by_ip.entry(ip.to_owned()).or_default();
        purge(ip_window, now, length);

        if token_window.len() >= limit {
            debug!(scope = "token", "Rate limit exceeded");
            return Admission::Rejected {
                scope: RateLimitScope::Token,
                retry_after: retry_after(token_window, now, length),
            };
        }
        if ip_window.len() >= limit {
            debug!(scope = "ip", %ip, "Rate limit exceeded");
            return Admission::Rejected {
                scope: RateLimitScope::Ip,
                retry_after: retry_after(ip_window, now, length),
            };
        }

        token_window.push_back(now);
        ip_window.push_back(now);
        Admission::Allowed
    }

    /// Forget keys whose windows are empty. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// [`RateLimiter::sweep`] against an explicit clock reading
    pub fn sweep_at(&self, now: Instant) -> usize {
        let length = self.config.window;
        let mut guard = self.windows.lock();
        let windows = &mut *guard;
        let before = windows.by_token.len() + windows.by_ip.len();

        for map in [&mut windows.by_token, &mut windows.by_ip] {
            map.retain(|_, window| {
                purge(window, now, length);
                !window.is_empty()
            });
        }

        before - (windows.by_token.len() + windows.by_ip.len())
    }

    /// Number of tracked keys (tokens plus addresses)
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        let windows = self.windows.lock();
        windows.by_token.len() + windows.by_ip.len()
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(60);

    fn limiter(max: usize) -> RateLimiter {
        RateLimiter::new(RateLimitConfig::per_minute(max))
    }

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = limiter(5);
        let now = Instant::now();

        for _ in 0..5 {
            assert!(limiter.check_at("t", "10.0.0.1", now).is_allowed());
        }
        assert!(!limiter.check_at("t", "10.0.0.1", now).is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_caller_readmitted_after_window() {
        let limiter = limiter(2);

        assert!(limiter.check("t", "ip").is_allowed());
        assert!(limiter.check("t", "ip").is_allowed());
        match limiter.check("t", "ip") {
            Admission::Rejected { retry_after, .. } => assert_eq!(retry_after, WINDOW),
            Admission::Allowed => panic!("third request should be rejected"),
        }

        tokio::time::advance(WINDOW).await;
        assert!(limiter.check("t", "ip").is_allowed());
    }

    #[test]
    fn test_window_slides() {
        let limiter = limiter(2);
        let start = Instant::now();

        assert!(limiter.check_at("t", "ip", start).is_allowed());
        assert!(limiter
            .check_at("t", "ip", start + Duration::from_secs(30))
            .is_allowed());
        assert!(!limiter
            .check_at("t", "ip", start + Duration::from_secs(59))
            .is_allowed());

        // The first request leaves the window
        assert!(limiter.check_at("t", "ip", start + WINDOW).is_allowed());
    }

    #[test]
    fn test_token_quota_spans_addresses() {
        let limiter = limiter(3);
        let now = Instant::now();

        for i in 0..3 {
            assert!(limiter.check_at("shared", &format!("10.0.0.{i}"), now).is_allowed());
        }
        let admission = limiter.check_at("shared", "10.0.0.99", now);
        assert!(matches!(
            admission,
            Admission::Rejected {
                scope: RateLimitScope::Token,
                ..
            }
        ));
    }

    #[test]
    fn test_ip_quota_spans_tokens() {
        let limiter = limiter(3);
        let now = Instant::now();

        for i in 0..3 {
            assert!(limiter.check_at(&format!("tok-{i}"), "10.0.0.1", now).is_allowed());
        }
        let admission = limiter.check_at("fresh", "10.0.0.1", now);
        assert!(matches!(
            admission,
            Admission::Rejected {
                scope: RateLimitScope::Ip,
                ..
            }
        ));
    }

    #[test]
    fn test_rejection_records_nothing() {
        let limiter = limiter(1);
        let start = Instant::now();

        assert!(limiter.check_at("a", "ip-1", start).is_allowed());
        // Rejected by the token window; must not consume ip-2's quota
        assert!(!limiter.check_at("a", "ip-2", start).is_allowed());
        assert!(limiter.check_at("b", "ip-2", start).is_allowed());
    }

    #[test]
    fn test_retry_after_points_at_oldest_entry() {
        let limiter = limiter(1);
        let start = Instant::now();

        assert!(limiter.check_at("t", "ip", start).is_allowed());
        match limiter.check_at("t", "ip", start + Duration::from_secs(20)) {
            Admission::Rejected { retry_after, .. } => {
                assert_eq!(retry_after, Duration::from_secs(40));
            }
            Admission::Allowed => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_disabled_limiter_admits_everything() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            max_requests: 0,
            ..Default::default()
        });
        assert!(limiter.is_allowed("t", "ip"));
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_sweep_drops_idle_keys() {
        let limiter = limiter(5);
        let start = Instant::now();

        assert!(limiter.check_at("t1", "ip1", start).is_allowed());
        assert!(limiter
            .check_at("t2", "ip2", start + Duration::from_secs(50))
            .is_allowed());
        assert_eq!(limiter.tracked_keys(), 4);

        let dropped = limiter.sweep_at(start + Duration::from_secs(70));
        assert_eq!(dropped, 2);
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn test_concurrent_callers_never_exceed_limit() {
        let limiter = Arc::new(limiter(10));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    (0..10)
                        .filter(|_| limiter.is_allowed("shared", "127.0.0.1"))
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 10);
    }
}
