//! Hermod error types
//!
//! [`HermodError`] classifies *what* went wrong. [`ApiError`] is the
//! normalized error every public operation returns: it wraps a cause and
//! carries the HTTP status, the request it belongs to, when it happened and
//! whether its status is one the server may recover from.

use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::types::{RequestConfig, ResponseBody};

/// HTTP statuses that mark an error as retryable.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Whether a status code belongs to [`RETRYABLE_STATUSES`].
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Cause taxonomy for request failures.
#[derive(Debug, thiserror::Error)]
pub enum HermodError {
    // Transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timed out")]
    Timeout,

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        body: ResponseBody,
        retry_after: Option<Duration>,
    },

    /// Rejected locally by the client's rate limiter; never sent.
    #[error("rate limit exceeded for {endpoint}")]
    RateLimited { endpoint: String },

    // Pipeline errors
    #[error("interceptor error: {0}")]
    Interceptor(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl HermodError {
    /// Whether the failure is worth another attempt.
    ///
    /// Transport failures and timeouts are always transient; API errors
    /// only when their status is in [`RETRYABLE_STATUSES`].
    pub fn is_transient(&self) -> bool {
        match self {
            HermodError::Http(_) | HermodError::Timeout => true,
            HermodError::Api { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// HTTP status implied by this cause, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            HermodError::Api { status, .. } => Some(*status),
            HermodError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HermodError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HermodError::Timeout
        } else if err.is_builder() {
            HermodError::InvalidInput(err.to_string())
        } else {
            HermodError::Http(err.to_string())
        }
    }
}

/// Identifies the request an [`ApiError`] belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestSummary {
    pub method: String,
    pub url: String,
    pub request_id: Option<String>,
}

impl From<&RequestConfig> for RequestSummary {
    fn from(config: &RequestConfig) -> Self {
        Self {
            method: config.method.to_string(),
            url: config.url.clone(),
            request_id: config.metadata.request_id.clone(),
        }
    }
}

/// Normalized request error.
///
/// `retryable` is derived from `status` alone. Use [`ApiError::should_retry`]
/// for the wider retry decision that also covers transport failures.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub status: Option<u16>,
    pub request: Option<RequestSummary>,
    #[source]
    pub cause: HermodError,
    pub timestamp: SystemTime,
    pub retryable: bool,
}

impl ApiError {
    /// Wrap a cause, deriving message, status and retryability from it.
    pub fn new(cause: HermodError) -> Self {
        let message = match &cause {
            HermodError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        };
        let status = cause.status();
        Self {
            message,
            status,
            request: None,
            cause,
            timestamp: SystemTime::now(),
            retryable: status.is_some_and(is_retryable_status),
        }
    }

    /// Attach the request this error belongs to.
    pub fn with_request(mut self, request: impl Into<RequestSummary>) -> Self {
        self.request = Some(request.into());
        self
    }

    /// Override the human-readable message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Whether the retry loop should try again after this error.
    pub fn should_retry(&self) -> bool {
        self.retryable || self.cause.is_transient()
    }

    /// Server-provided `Retry-After` hint, if one came with the response.
    pub fn retry_after(&self) -> Option<Duration> {
        match &self.cause {
            HermodError::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Parsed error body returned by the server, if any.
    pub fn body(&self) -> Option<&ResponseBody> {
        match &self.cause {
            HermodError::Api { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Whether the local rate limiter rejected the request.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.cause, HermodError::RateLimited { .. })
    }
}

impl From<HermodError> for ApiError {
    fn from(cause: HermodError) -> Self {
        ApiError::new(cause)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::new(HermodError::Json(err))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::new(HermodError::from(err))
    }
}

/// Result type alias for Hermod operations
pub type Result<T> = std::result::Result<T, ApiError>;
