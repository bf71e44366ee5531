//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use pgben_lifecycle::GrantLifecycleManager;
use pgben_storage::MemoryStorage;
use tokio::sync::Mutex;

use super::RATE_LIMIT_WINDOW_SECS;

/// Requests seen from one client in the current window.
struct Window {
    count: u64,
    started: Instant,
}

/// In-memory fixed-window rate limiter keyed by client IP.
pub(crate) struct RateLimiter {
    windows: Mutex<HashMap<IpAddr, Window>>,
    max_requests: u64,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
        }
    }

    /// Count a request from `ip`.
    /// Returns Err(retry_after_secs) once the window's budget is spent.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.check_at(ip, Instant::now()).await
    }

    async fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        let mut windows = self.windows.lock().await;
        let window = windows.entry(ip).or_insert(Window {
            count: 0,
            started: now,
        });

        let elapsed = now.duration_since(window.started).as_secs();
        if elapsed >= RATE_LIMIT_WINDOW_SECS {
            window.count = 0;
            window.started = now;
        }

        window.count += 1;
        if window.count > self.max_requests {
            Err(RATE_LIMIT_WINDOW_SECS.saturating_sub(elapsed))
        } else {
            Ok(())
        }
    }
}

/// Application state shared across request handlers.
pub(crate) struct AppState {
    pub(crate) manager: GrantLifecycleManager<MemoryStorage>,
    pub(crate) rate_limiter: RateLimiter,
    /// None = no auth required.
    pub(crate) api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn budget_is_per_ip_and_per_window() {
        let limiter = RateLimiter::new(2);
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        let t0 = Instant::now();

        assert!(limiter.check_at(a, t0).await.is_ok());
        assert!(limiter.check_at(a, t0).await.is_ok());
        assert_eq!(limiter.check_at(a, t0).await, Err(RATE_LIMIT_WINDOW_SECS));
        assert!(limiter.check_at(b, t0).await.is_ok());

        let later = t0 + Duration::from_secs(RATE_LIMIT_WINDOW_SECS);
        assert!(limiter.check_at(a, later).await.is_ok());
    }
}
