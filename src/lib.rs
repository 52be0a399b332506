//! Hermod - HTTP request orchestration for API clients
//!
//! This crate wraps `reqwest` in a single [`ApiClient`] that every request
//! of an application flows through. Each call passes a client-side rate
//! limiter, a GET response cache, user transformers and ordered interceptor
//! chains, and a retry loop with exponential backoff. Failures come back as
//! a normalized [`ApiError`] after being logged and routed through a
//! status-keyed [`ErrorHandler`].
//!
//! # Example
//!
//! ```rust,no_run
//! use hermod::{ApiClient, interceptor::interceptor_fn, RequestConfig};
//!
//! #[tokio::main]
//! async fn main() -> hermod::Result<()> {
//!     let client = ApiClient::builder()
//!         .base_url("https://shop.example.com/api")
//!         .csrf_token("token-from-page")
//!         .build()?;
//!
//!     client.set_auth_token("secret", None);
//!     client
//!         .interceptors()
//!         .request
//!         .add(interceptor_fn(|req: RequestConfig| Ok(req.header("X-Tenant", "acme"))));
//!
//!     let user = client.get("/users/1").await?;
//!     println!("{:?}", user.data);
//!
//!     // Served from cache, no network round trip
//!     let again = client.get("/users/1").await?;
//!     assert!(again.metadata.from_cache);
//!
//!     println!("{:?}", client.stats());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod error_handler;
pub mod interceptor;
pub mod logger;
pub mod rate_limit;
pub mod stats;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use cache::{ApiCache, CacheConfig};
pub use client::{ApiClient, ApiClientBuilder, RetryConfig};
pub use config::ClientConfig;
pub use error::{ApiError, HermodError, RequestSummary, Result};
pub use error_handler::{ErrorHandler, StatusHandler};
pub use interceptor::{Interceptor, InterceptorChain, InterceptorId, Interceptors};
pub use logger::{ApiLogger, LogEntry, LogLevel};
pub use rate_limit::{RateLimit, RateLimiter};
pub use stats::ClientStats;

// Re-export all types
pub use types::{
    ApiResponse, FormPart, RequestBody, RequestConfig, RequestMetadata, ResponseBody,
    ResponseMetadata,
};
