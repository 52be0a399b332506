//! Retry configuration, delay calculation, and the shared retry loop.
//!
//! [`RetryConfig`] controls how many attempts a request gets and how long
//! to wait between them. The client drives every network call through
//! `with_retry()`, keeping retry logic in a single place.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::stats::StatsRecorder;
use crate::telemetry;
use crate::types::RequestConfig;
use crate::{ApiError, HermodError, Result};

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff: the n-th retry waits
/// `initial_delay * 2^(n-1)`, capped at `max_delay`.
///
/// ```rust
/// # use hermod::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for_attempt(2), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 1s.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculate the delay after a failed attempt (0-indexed).
    ///
    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Calculate the effective delay, respecting server `Retry-After` hints.
    ///
    /// A hint takes precedence over the backoff but is still capped at
    /// `max_delay`.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after
            .map(|hint| hint.min(self.max_delay))
            .unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

/// Execute a network operation with retry logic.
///
/// Retries errors for which [`ApiError::should_retry`] holds, up to
/// `config.max_attempts` attempts in total. Anything else is returned
/// immediately. When the budget runs out, the last error is returned.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    stats: &StatsRecorder,
    request: &RequestConfig,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 0..max_attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.should_retry() => {
                if attempt + 1 < max_attempts {
                    let delay = config.effective_delay(attempt, e.retry_after());
                    stats.record_retry();
                    metrics::counter!(telemetry::RETRIES_TOTAL,
                        "method" => request.method.to_string(),
                    )
                    .increment(1);
                    warn!(
                        method = %request.method,
                        url = %request.url,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e), // permanent error, no retry
        }
    }
    Err(last_err.unwrap_or_else(|| {
        ApiError::new(HermodError::Configuration(
            "retry loop finished without an attempt".into(),
        ))
    }))
}
