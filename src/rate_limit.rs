//! Per-key fixed-window request limiter
//!
//! One window per key. A window resets once more than `window` has elapsed
//! since it started. Breaching the limit is not an error: callers decide
//! whether to drop silently or notify.

use crate::models::UserId;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Rate-limited namespaces. Registration writes are throttled independently
/// from interactive actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateKey {
    Interaction(UserId),
    Registration(UserId),
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateKey::Interaction(id) => write!(f, "{}", id),
            RateKey::Registration(id) => write!(f, "register_{}", id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_per_window: u32,
    /// Keys untouched for this many windows are evicted by `sweep_idle`.
    pub idle_windows: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(1000),
            max_per_window: 5,
            idle_windows: 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    window_start: Instant,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request against `key` and report whether it is allowed.
    pub async fn allow(&self, key: &RateKey) -> bool {
        self.allow_raw(&key.to_string()).await
    }

    pub async fn allow_raw(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        let window = windows.entry(key.to_string()).or_insert(RateWindow {
            count: 0,
            window_start: now,
        });

        if now.saturating_duration_since(window.window_start) > self.config.window {
            window.count = 0;
            window.window_start = now;
        }

        window.count = window.count.saturating_add(1);
        let allowed = window.count <= self.config.max_per_window;

        if !allowed {
            debug!(key = %key, count = window.count, "Rate limit exceeded");
        }

        allowed
    }

    /// Evict keys whose window started more than `idle_windows` windows ago.
    pub async fn sweep_idle(&self) -> usize {
        let now = Instant::now();
        let idle_for = self.config.window * self.config.idle_windows;
        let mut windows = self.windows.lock().await;

        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.window_start) <= idle_for);
        before - windows.len()
    }

    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
