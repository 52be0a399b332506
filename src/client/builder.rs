//! Builder for configuring client instances

use std::time::Duration;

use super::ApiClient;
use crate::config::ClientConfig;
use crate::rate_limit::RateLimit;
use crate::{ApiError, HermodError, Result};

/// Builder for [`ApiClient`].
///
/// ```rust,no_run
/// # use std::time::Duration;
/// # fn main() -> hermod::Result<()> {
/// let client = hermod::ApiClient::builder()
///     .base_url("https://shop.example.com/api")
///     .timeout(Duration::from_secs(10))
///     .retry_attempts(5)
///     .build()?;
/// # let _ = client;
/// # Ok(())
/// # }
/// ```
pub struct ApiClientBuilder {
    config: ClientConfig,
    http: Option<reqwest::Client>,
}

impl ApiClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            http: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a preconfigured reqwest client (proxies, TLS roots, pools).
    ///
    /// Per-request timeouts are still applied on top of it.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config = self.config.base_url(url);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    pub fn retry_attempts(mut self, n: u32) -> Self {
        self.config = self.config.retry_attempts(n);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config = self.config.retry_delay(delay);
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.config = self.config.max_retry_delay(delay);
        self
    }

    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config = self.config.enable_logging(enabled);
        self
    }

    pub fn enable_caching(mut self, enabled: bool) -> Self {
        self.config = self.config.enable_caching(enabled);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config = self.config.cache_ttl(ttl);
        self
    }

    pub fn cache_max_entries(mut self, max: Option<u64>) -> Self {
        self.config = self.config.cache_max_entries(max);
        self
    }

    pub fn csrf_token(mut self, token: impl Into<String>) -> Self {
        self.config = self.config.csrf_token(token);
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config = self.config.default_header(name, value);
        self
    }

    /// Per-endpoint budget, keyed on URL path.
    pub fn rate_limit(mut self, endpoint: impl Into<String>, requests: u32, window: Duration) -> Self {
        self.config = self
            .config
            .rate_limit(endpoint, RateLimit::new(requests, window));
        self
    }

    /// Build the client.
    ///
    /// Fails with [`HermodError::Configuration`] when the configuration is
    /// inconsistent or the HTTP client cannot be constructed.
    pub fn build(self) -> Result<ApiClient> {
        self.config.validate()?;
        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .user_agent(concat!("hermod/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| {
                    ApiError::new(HermodError::Configuration(format!(
                        "failed to build HTTP client: {e}"
                    )))
                })?,
        };
        Ok(ApiClient::from_parts(http, self.config))
    }
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
