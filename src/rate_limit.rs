//! Client-side per-endpoint rate limiting.
//!
//! Each endpoint (the path component of the request URL) gets a fixed
//! window counter. Windows are created on first use with the limiter's
//! default and reset lazily once their deadline has passed. There is no
//! queueing: a call over the limit is simply refused.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;
use tracing::debug;

/// Requests allowed per window when no override is set.
pub const DEFAULT_REQUESTS: u32 = 100;

/// Window length when no override is set.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// A request budget: `requests` calls per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimit {
    pub requests: u32,
    #[serde(rename = "window_ms", with = "crate::config::millis")]
    pub window: Duration,
}

impl RateLimit {
    pub fn new(requests: u32, window: Duration) -> Self {
        Self { requests, window }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS, DEFAULT_WINDOW)
    }
}

#[derive(Debug)]
struct RateWindow {
    count: u32,
    reset_at: Instant,
    limit: RateLimit,
}

impl RateWindow {
    fn open(limit: RateLimit, now: Instant) -> Self {
        Self {
            count: 0,
            reset_at: now + limit.window,
            limit,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now > self.reset_at {
            self.count = 0;
            self.reset_at = now + self.limit.window;
        }
    }
}

/// Fixed-window rate limiter keyed on endpoint path.
pub struct RateLimiter {
    default: RateLimit,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    /// Create a limiter with the default budget (100 requests per minute).
    pub fn new() -> Self {
        Self::with_default(RateLimit::default())
    }

    /// Create a limiter whose endpoints start with `default`.
    pub fn with_default(default: RateLimit) -> Self {
        Self {
            default,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Install a custom budget for one endpoint path (e.g. `/api/orders`).
    ///
    /// Replaces any window already open for that endpoint.
    pub fn set_limit(&self, endpoint: impl Into<String>, requests: u32, window: Duration) {
        let limit = RateLimit::new(requests, window);
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.insert(endpoint.into(), RateWindow::open(limit, Instant::now()));
    }

    /// Consume one request from the endpoint's budget.
    ///
    /// Returns `false` when the budget for the current window is spent.
    pub fn check_limit(&self, url: &str) -> bool {
        let key = endpoint_key(url);
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window = windows
            .entry(key)
            .or_insert_with(|| RateWindow::open(self.default, now));
        window.roll(now);

        if window.count >= window.limit.requests {
            debug!(
                url,
                limit = window.limit.requests,
                "rate limit exhausted for endpoint"
            );
            return false;
        }
        window.count += 1;
        true
    }

    /// Requests left in the endpoint's current window, without consuming any.
    pub fn remaining(&self, url: &str) -> u32 {
        let key = endpoint_key(url);
        let now = Instant::now();
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        match windows.get(&key) {
            Some(w) if now > w.reset_at => w.limit.requests,
            Some(w) => w.limit.requests.saturating_sub(w.count),
            None => self.default.requests,
        }
    }

    /// Forget every window and override.
    pub fn reset(&self) {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the rate-limit key (path component) from an absolute or
/// relative URL.
pub fn endpoint_key(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        return parsed.path().to_string();
    }
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_string()
}
