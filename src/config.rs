//! Client configuration.
//!
//! [`ClientConfig`] can be built in code with chained setters or loaded from
//! TOML. File resolution order for [`ClientConfig::load`]:
//! 1. explicit path (e.g. `--config <path>`)
//! 2. `~/.hermod/config.toml` (user)
//! 3. `/etc/hermod/config.toml` (system)
//!
//! Durations in TOML are integer milliseconds:
//!
//! ```toml
//! base_url = "https://shop.example.com/api"
//! timeout_ms = 10000
//! retry_attempts = 3
//! retry_delay_ms = 1000
//! enable_logging = true
//! enable_caching = true
//! cache_ttl_ms = 300000
//! csrf_token = "..."
//!
//! [rate_limits."/api/orders"]
//! requests = 10
//! window_ms = 1000
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::client::RetryConfig;
use crate::rate_limit::RateLimit;
use crate::{ApiError, HermodError, Result};

/// Options recognized by [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix for relative request URLs (default: `/api`).
    ///
    /// Must resolve to an absolute `http(s)` URL before requests can be
    /// sent, e.g. `https://shop.example.com/api`.
    pub base_url: String,
    /// Per-request timeout. Default: 30s.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
    /// Total attempts per request, including the first. Default: 3.
    pub retry_attempts: u32,
    /// Base backoff delay; doubles per retry. Default: 1s.
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,
    /// Upper bound on a single backoff delay. Default: 30s.
    #[serde(rename = "max_retry_delay_ms", with = "millis")]
    pub max_retry_delay: Duration,
    /// Record request outcomes in the [`ApiLogger`](crate::ApiLogger). Default: true.
    pub enable_logging: bool,
    /// Cache successful GET responses. Default: true.
    pub enable_caching: bool,
    /// TTL for cached responses. Default: 5 minutes.
    #[serde(rename = "cache_ttl_ms", with = "millis")]
    pub cache_ttl: Duration,
    /// Cache capacity; `None` for unbounded. Default: 10,000.
    pub cache_max_entries: Option<u64>,
    /// Sent as `X-CSRF-TOKEN` on every request when set.
    pub csrf_token: Option<String>,
    /// Headers added to every request unless the request sets them itself.
    pub default_headers: BTreeMap<String, String>,
    /// Per-endpoint rate-limit overrides keyed on URL path.
    pub rate_limits: BTreeMap<String, RateLimit>,
    /// Budget for endpoints without an override.
    pub default_rate_limit: RateLimit,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "/api".to_string(),
            timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
            enable_logging: true,
            enable_caching: true,
            cache_ttl: Duration::from_secs(300),
            cache_max_entries: Some(10_000),
            csrf_token: None,
            default_headers: BTreeMap::from([
                ("Accept".to_string(), "application/json".to_string()),
                ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
            ]),
            rate_limits: BTreeMap::new(),
            default_rate_limit: RateLimit::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_attempts(mut self, n: u32) -> Self {
        self.retry_attempts = n;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    pub fn enable_caching(mut self, enabled: bool) -> Self {
        self.enable_caching = enabled;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn cache_max_entries(mut self, max: Option<u64>) -> Self {
        self.cache_max_entries = max;
        self
    }

    pub fn csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn rate_limit(mut self, endpoint: impl Into<String>, limit: RateLimit) -> Self {
        self.rate_limits.insert(endpoint.into(), limit);
        self
    }

    pub fn default_rate_limit(mut self, limit: RateLimit) -> Self {
        self.default_rate_limit = limit;
        self
    }

    /// Retry policy derived from the retry options.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.retry_attempts)
            .initial_delay(self.retry_delay)
            .max_delay(self.max_retry_delay)
    }

    /// Cache settings derived from the cache options.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .ttl(self.cache_ttl)
            .max_entries(self.cache_max_entries)
    }

    /// Reject option combinations the client cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.retry_attempts == 0 {
            return Err(config_error("retry_attempts must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(config_error("timeout must be greater than zero"));
        }
        if let Some((endpoint, _)) = self.rate_limits.iter().find(|(_, l)| l.window.is_zero()) {
            return Err(config_error(format!(
                "rate limit window for {endpoint} must be greater than zero"
            )));
        }
        Ok(())
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path)
            .map_err(|e| config_error(format!("Failed to read config file {path:?}: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| config_error(format!("Failed to parse config file {path:?}: {e}")))
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(config_error(format!("Config file not found: {path:?}")));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".hermod").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/hermod/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(config_error(
            "No config file found. Create ~/.hermod/config.toml or /etc/hermod/config.toml",
        ))
    }
}

fn config_error(message: impl Into<String>) -> ApiError {
    ApiError::new(HermodError::Configuration(message.into()))
}

/// Serde adapter for `Duration` as integer milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
