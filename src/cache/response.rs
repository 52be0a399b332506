//! TTL response cache for GET requests.
//!
//! [`ApiCache`] stores [`ApiResponse`]s keyed on the request URL plus its
//! sorted query string, so `?b=2&a=1` and `?a=1&b=2` share an entry.
//!
//! # Expiry
//!
//! Every entry carries its own time-to-live. Expiry is lazy: an entry past
//! its deadline reads as absent and is dropped by moka's maintenance, with
//! no background sweep the caller can observe.
//!
//! # Capacity
//!
//! The cache is bounded by [`CacheConfig::max_entries`] (default 10,000,
//! least-recently-used entries go first). Passing `None` makes it
//! unbounded, which is only sensible for short-lived processes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use url::form_urlencoded;

use crate::telemetry;
use crate::types::ApiResponse;

/// Configuration for the response cache.
///
/// ```rust
/// # use hermod::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(Some(500))
///     .ttl(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries; `None` for unbounded. Default: 10,000.
    pub max_entries: Option<u64>,
    /// Default time-to-live for cached entries. Default: 5 minutes.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: Some(10_000),
            ttl: Duration::from_secs(300),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: Option<u64>) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the default time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

#[derive(Clone)]
struct CachedEntry {
    response: Arc<ApiResponse>,
    ttl: Duration,
}

/// Per-entry expiry: each insert (or overwrite) restarts the entry's own TTL.
struct EntryTtl;

impl Expiry<String, CachedEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory response cache with per-entry TTL.
pub struct ApiCache {
    entries: Cache<String, CachedEntry>,
    default_ttl: Duration,
}

impl ApiCache {
    /// Create a new response cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let mut builder = Cache::builder().expire_after(EntryTtl);
        if let Some(max) = config.max_entries {
            builder = builder.max_capacity(max);
        }
        Self {
            entries: builder.build(),
            default_ttl: config.ttl,
        }
    }

    /// TTL applied by the client when caching GET responses.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a cached response.
    ///
    /// Returns `None` on miss or once the entry has expired.
    pub async fn get(
        &self,
        url: &str,
        params: Option<&BTreeMap<String, String>>,
    ) -> Option<ApiResponse> {
        let key = cache_key(url, params);
        match self.entries.get(&key).await {
            Some(entry) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                Some(ApiResponse::clone(&entry.response))
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    /// Store a response for `ttl`.
    pub async fn set(
        &self,
        url: &str,
        params: Option<&BTreeMap<String, String>>,
        value: ApiResponse,
        ttl: Duration,
    ) {
        let entry = CachedEntry {
            response: Arc::new(value),
            ttl,
        };
        self.entries.insert(cache_key(url, params), entry).await;
    }

    /// Drop a single entry.
    pub async fn invalidate(&self, url: &str, params: Option<&BTreeMap<String, String>>) {
        self.entries.invalidate(&cache_key(url, params)).await;
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Number of live entries, after pending evictions are applied.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    /// Whether the cache holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ApiCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

/// Compute the cache key: `url + '?' + sorted, form-encoded query string`.
///
/// `BTreeMap` iteration is ordered, which gives the sorting for free. Keys
/// and values are encoded the way they go out on the wire, so a value
/// containing `&` or `=` cannot alias a different parameter set.
pub fn cache_key(url: &str, params: Option<&BTreeMap<String, String>>) -> String {
    let query = params
        .map(|p| {
            form_urlencoded::Serializer::new(String::new())
                .extend_pairs(p)
                .finish()
        })
        .unwrap_or_default();
    format!("{url}?{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn cache_key_without_params() {
        assert_eq!(cache_key("/api/users", None), "/api/users?");
    }

    #[test]
    fn cache_key_sorts_params() {
        let a = params(&[("page", "2"), ("active", "1")]);
        assert_eq!(cache_key("/api/users", Some(&a)), "/api/users?active=1&page=2");
    }

    #[test]
    fn cache_key_differs_on_url() {
        let p = params(&[("id", "1")]);
        assert_ne!(cache_key("/a", Some(&p)), cache_key("/b", Some(&p)));
    }

    #[test]
    fn cache_key_differs_on_values() {
        let p1 = params(&[("id", "1")]);
        let p2 = params(&[("id", "2")]);
        assert_ne!(cache_key("/a", Some(&p1)), cache_key("/a", Some(&p2)));
    }

    #[test]
    fn cache_key_encodes_reserved_characters() {
        let single = params(&[("a", "1&b=2")]);
        let pair = params(&[("a", "1"), ("b", "2")]);
        assert_ne!(cache_key("/s", Some(&single)), cache_key("/s", Some(&pair)));
        assert_eq!(cache_key("/s", Some(&single)), "/s?a=1%26b%3D2");
        assert_eq!(cache_key("/s", Some(&pair)), "/s?a=1&b=2");
    }

    #[test]
    fn cache_key_encodes_spaces_and_unicode() {
        let p = params(&[("q", "smørbrød og øl"), ("100%", "x")]);
        assert_eq!(
            cache_key("/s", Some(&p)),
            "/s?100%25=x&q=sm%C3%B8rbr%C3%B8d+og+%C3%B8l"
        );
    }

    #[test]
    fn config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, Some(10_000));
        assert_eq!(config.ttl, Duration::from_secs(300));
    }
}
