//! Status-code keyed error dispatch.
//!
//! [`ErrorHandler`] maps HTTP status codes to [`StatusHandler`]s. The
//! client routes every terminal error through [`ErrorHandler::handle`]:
//! a handler may log, translate or even recover from the error, and
//! statuses with no handler propagate unchanged.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

use crate::logger::{ApiLogger, LogLevel};
use crate::types::{ApiResponse, RequestConfig};
use crate::{ApiError, Result};

/// Reaction to an error with a given status.
///
/// Returning `Err` rejects (the usual case); returning `Ok` recovers with
/// a substitute response.
pub trait StatusHandler: Send + Sync {
    fn handle(&self, error: ApiError) -> Result<ApiResponse>;
}

impl<F> StatusHandler for F
where
    F: Fn(ApiError) -> Result<ApiResponse> + Send + Sync,
{
    fn handle(&self, error: ApiError) -> Result<ApiResponse> {
        self(error)
    }
}

/// Statuses with a built-in handler, and what each one logs.
const DEFAULT_HANDLERS: &[(u16, LogLevel, &str)] = &[
    (401, LogLevel::Warn, "authentication required"),
    (403, LogLevel::Warn, "access forbidden"),
    (404, LogLevel::Warn, "resource not found"),
    (429, LogLevel::Warn, "too many requests"),
    (500, LogLevel::Error, "internal server error"),
];

/// Dispatch table from status code to handler.
pub struct ErrorHandler {
    handlers: RwLock<HashMap<u16, Arc<dyn StatusHandler>>>,
}

impl ErrorHandler {
    /// Create a handler table with the default 401/403/404/429/500 entries,
    /// each of which logs to `logger` and rejects.
    pub fn new(logger: Arc<ApiLogger>) -> Self {
        let table = Self::empty();
        for &(status, level, label) in DEFAULT_HANDLERS {
            let logger = logger.clone();
            table.register(status, move |error: ApiError| -> Result<ApiResponse> {
                logger.log(
                    level,
                    format!("{label}: {}", error.message),
                    Some(serde_json::json!({
                        "status": status,
                        "request": error.request,
                    })),
                );
                Err(error)
            });
        }
        table
    }

    /// Create a table with no handlers at all.
    pub fn empty() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Install (or replace) the handler for `status`.
    pub fn register(&self, status: u16, handler: impl StatusHandler + 'static) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(status, Arc::new(handler));
    }

    /// Remove the handler for `status`. Returns whether one existed.
    pub fn remove(&self, status: u16) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&status)
            .is_some()
    }

    pub fn has_handler(&self, status: u16) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&status)
    }

    /// Dispatch on `error.status`; unhandled statuses are rejected as-is.
    pub fn handle(&self, error: ApiError) -> Result<ApiResponse> {
        let handler = error.status.and_then(|status| {
            self.handlers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&status)
                .cloned()
        });
        match handler {
            Some(handler) => handler.handle(error),
            None => Err(error),
        }
    }

    /// Normalize an error and tie it to `request`.
    ///
    /// Message, status and cause are preserved; the request summary is
    /// attached when missing and `retryable` is recomputed from the status.
    pub fn enhance(error: impl Into<ApiError>, request: &RequestConfig) -> ApiError {
        let mut error = error.into();
        if error.request.is_none() {
            error = error.with_request(request);
        }
        let derived = error.status.is_some_and(crate::error::is_retryable_status);
        if error.retryable != derived {
            warn!(
                status = ?error.status,
                "correcting retryable flag inconsistent with status"
            );
            error.retryable = derived;
        }
        error
    }
}
