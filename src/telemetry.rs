//! Telemetry metric name constants.
//!
//! Centralised metric names for hermod operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `hermod_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `method`: HTTP method (e.g. "GET", "POST")
//! - `status`: outcome, "ok" or "error"
//! - `endpoint`: URL path the rate limiter keyed on

/// Total top-level requests (one per `request()` call, retries excluded).
///
/// Labels: `method`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "hermod_requests_total";

/// Network round-trip duration in seconds for successful responses.
///
/// Labels: `method`.
pub const REQUEST_DURATION_SECONDS: &str = "hermod_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `method`.
pub const RETRIES_TOTAL: &str = "hermod_retries_total";

/// Total response cache hits.
pub const CACHE_HITS_TOTAL: &str = "hermod_cache_hits_total";

/// Total response cache misses.
pub const CACHE_MISSES_TOTAL: &str = "hermod_cache_misses_total";

/// Total requests rejected by the client-side rate limiter.
///
/// Labels: `endpoint`.
pub const RATE_LIMITED_TOTAL: &str = "hermod_rate_limited_total";
