//! The API client and its request pipeline.
//!
//! Provides [`ApiClient`], configured through [`ApiClientBuilder`] or a
//! [`ClientConfig`](crate::ClientConfig), and the [`RetryConfig`] that
//! governs backoff between attempts.

mod api_client;
mod builder;
pub mod retry;
mod transport;

pub use api_client::{ApiClient, RequestTransformer, ResponseTransformer, resolve_url};
pub use builder::ApiClientBuilder;
pub use retry::RetryConfig;
