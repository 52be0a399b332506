//! Interceptors the client installs on construction.
//!
//! Request side, in order: [`RequestMetadataInterceptor`] (request id and
//! start time), [`AuthInterceptor`] (`Authorization` header) and
//! [`CsrfInterceptor`] (`X-CSRF-TOKEN` header). Response side:
//! [`TimingInterceptor`] (response-time stats and outcome log).
//!
//! They are ordinary interceptors and can be ejected like any other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Instant, SystemTime};

use async_trait::async_trait;

use super::Interceptor;
use crate::Result;
use crate::logger::ApiLogger;
use crate::stats::StatsRecorder;
use crate::telemetry;
use crate::types::{ApiResponse, RequestConfig, epoch_millis};

/// Header carrying the CSRF token.
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// `Authorization` scheme and token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub kind: String,
    pub token: String,
}

impl AuthToken {
    pub fn header_value(&self) -> String {
        format!("{} {}", self.kind, self.token)
    }
}

/// Credentials shared between the client and its auth/CSRF interceptors.
#[derive(Debug, Default)]
pub struct Credentials {
    auth: RwLock<Option<AuthToken>>,
    csrf: RwLock<Option<String>>,
}

impl Credentials {
    pub fn set_auth(&self, token: Option<AuthToken>) {
        *self.auth.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn auth(&self) -> Option<AuthToken> {
        self.auth
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_csrf(&self, token: Option<String>) {
        *self.csrf.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn csrf(&self) -> Option<String> {
        self.csrf
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(0);

/// Generate a process-unique request id: `req_<epoch ms>_<sequence>`.
pub fn next_request_id() -> String {
    let seq = REQUEST_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("req_{}_{seq}", epoch_millis(SystemTime::now()))
}

/// Stamps each request with an id and a start time.
pub struct RequestMetadataInterceptor;

#[async_trait]
impl Interceptor<RequestConfig> for RequestMetadataInterceptor {
    async fn on_fulfilled(&self, mut request: RequestConfig) -> Result<RequestConfig> {
        if request.metadata.request_id.is_none() {
            request.metadata.request_id = Some(next_request_id());
        }
        request.metadata.start_time = Some(Instant::now());
        Ok(request)
    }
}

/// Adds `Authorization: <kind> <token>` once a token is set.
pub struct AuthInterceptor {
    credentials: Arc<Credentials>,
}

impl AuthInterceptor {
    pub fn new(credentials: Arc<Credentials>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl Interceptor<RequestConfig> for AuthInterceptor {
    async fn on_fulfilled(&self, request: RequestConfig) -> Result<RequestConfig> {
        match self.credentials.auth() {
            Some(auth) => Ok(request.header("Authorization", auth.header_value())),
            None => Ok(request),
        }
    }
}

/// Adds the `X-CSRF-TOKEN` header when a token is configured.
pub struct CsrfInterceptor {
    credentials: Arc<Credentials>,
}

impl CsrfInterceptor {
    pub fn new(credentials: Arc<Credentials>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl Interceptor<RequestConfig> for CsrfInterceptor {
    async fn on_fulfilled(&self, request: RequestConfig) -> Result<RequestConfig> {
        match self.credentials.csrf() {
            Some(token) => Ok(request.header(CSRF_HEADER, token)),
            None => Ok(request),
        }
    }
}

/// Folds each response time into the running average and logs the outcome.
pub(crate) struct TimingInterceptor {
    stats: Arc<StatsRecorder>,
    logger: Arc<ApiLogger>,
}

impl TimingInterceptor {
    pub(crate) fn new(stats: Arc<StatsRecorder>, logger: Arc<ApiLogger>) -> Self {
        Self { stats, logger }
    }
}

#[async_trait]
impl Interceptor<ApiResponse> for TimingInterceptor {
    async fn on_fulfilled(&self, response: ApiResponse) -> Result<ApiResponse> {
        let elapsed = response.metadata.response_time;
        self.stats.record_success(elapsed);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "method" => response.config.method.to_string(),
        )
        .record(elapsed.as_secs_f64());

        self.logger.info(
            format!(
                "{} {} -> {}",
                response.config.method, response.config.url, response.status
            ),
            Some(serde_json::json!({
                "request_id": response.metadata.request_id,
                "status": response.status,
                "duration_ms": elapsed.as_millis() as u64,
            })),
        );
        Ok(response)
    }
}
