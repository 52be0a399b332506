//! Caching subsystem.
//!
//! [`ApiCache`] is the client's GET response cache. It is consulted after
//! the rate limiter and before any interceptor runs, so a hit bypasses the
//! network, retries and response interceptors entirely. Only successful GET
//! responses are stored; see [`response`] for key and expiry rules.

pub mod response;

pub use response::{ApiCache, CacheConfig, cache_key};
