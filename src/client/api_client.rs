//! The request orchestrator.
//!
//! [`ApiClient::request`] drives every call through the same pipeline:
//! normalize, rate-limit, cache lookup, request transformers and
//! interceptors, network with retry, response transformers and
//! interceptors, cache fill. Terminal errors are normalized, recorded and
//! routed through the [`ErrorHandler`] before reaching the caller.

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::builder::ApiClientBuilder;
use super::retry::{RetryConfig, with_retry};
use super::transport;
use crate::cache::ApiCache;
use crate::config::ClientConfig;
use crate::error_handler::ErrorHandler;
use crate::interceptor::Interceptors;
use crate::interceptor::builtin::{
    AuthInterceptor, AuthToken, Credentials, CsrfInterceptor, RequestMetadataInterceptor,
    TimingInterceptor,
};
use crate::logger::ApiLogger;
use crate::rate_limit::{RateLimiter, endpoint_key};
use crate::stats::{ClientStats, StatsRecorder};
use crate::telemetry;
use crate::types::{ApiResponse, RequestBody, RequestConfig};
use crate::{HermodError, Result};

/// Synchronous transform applied to every request before the interceptors.
pub type RequestTransformer = Arc<dyn Fn(RequestConfig) -> Result<RequestConfig> + Send + Sync>;

/// Synchronous transform applied to every response before the interceptors.
pub type ResponseTransformer = Arc<dyn Fn(ApiResponse) -> Result<ApiResponse> + Send + Sync>;

/// HTTP client with caching, rate limiting, interceptors and retry.
///
/// Cheap to clone: clones share one cache, limiter, log and stats.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    config: ClientConfig,
    retry: RetryConfig,
    cache: ApiCache,
    rate_limiter: RateLimiter,
    interceptors: Interceptors,
    logger: Arc<ApiLogger>,
    error_handler: ErrorHandler,
    stats: Arc<StatsRecorder>,
    credentials: Arc<Credentials>,
    request_transformers: RwLock<Vec<RequestTransformer>>,
    response_transformers: RwLock<Vec<ResponseTransformer>>,
}

impl ApiClient {
    /// Create a builder for configuring a client.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    /// Build a client from a complete configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        ApiClientBuilder::new().config(config).build()
    }

    pub(crate) fn from_parts(http: reqwest::Client, config: ClientConfig) -> Self {
        let logger = Arc::new(ApiLogger::new());
        logger.set_enabled(config.enable_logging);

        let credentials = Arc::new(Credentials::default());
        credentials.set_csrf(config.csrf_token.clone());

        let rate_limiter = RateLimiter::with_default(config.default_rate_limit);
        for (endpoint, limit) in &config.rate_limits {
            rate_limiter.set_limit(endpoint.clone(), limit.requests, limit.window);
        }

        let stats = Arc::new(StatsRecorder::default());
        let interceptors = Interceptors::default();
        interceptors.request.add(RequestMetadataInterceptor);
        interceptors
            .request
            .add(AuthInterceptor::new(credentials.clone()));
        interceptors
            .request
            .add(CsrfInterceptor::new(credentials.clone()));
        interceptors
            .response
            .add(TimingInterceptor::new(stats.clone(), logger.clone()));

        Self {
            inner: Arc::new(ClientInner {
                http,
                retry: config.retry_config(),
                cache: ApiCache::new(&config.cache_config()),
                rate_limiter,
                interceptors,
                error_handler: ErrorHandler::new(logger.clone()),
                logger,
                stats,
                credentials,
                request_transformers: RwLock::new(Vec::new()),
                response_transformers: RwLock::new(Vec::new()),
                config,
            }),
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Issue a request. A bare URL is shorthand for a GET.
    #[instrument(name = "hermod.request", skip_all)]
    pub async fn request(&self, request: impl Into<RequestConfig>) -> Result<ApiResponse> {
        let request = self.prepare(request.into());
        let context = RequestConfig::new(request.method.clone(), request.url.clone());
        let method = request.method.to_string();
        self.inner.stats.record_request();

        match self.dispatch(request).await {
            Ok(response) => {
                metrics::counter!(telemetry::REQUESTS_TOTAL,
                    "method" => method,
                    "status" => "ok",
                )
                .increment(1);
                Ok(response)
            }
            Err(err) => {
                let err = ErrorHandler::enhance(err, &context);
                self.inner.stats.record_error();
                metrics::counter!(telemetry::REQUESTS_TOTAL,
                    "method" => method,
                    "status" => "error",
                )
                .increment(1);
                self.inner.logger.error(
                    format!("{} {} failed: {}", context.method, context.url, err.message),
                    Some(json!({
                        "status": err.status,
                        "retryable": err.retryable,
                        "request": err.request,
                    })),
                );
                self.inner.error_handler.handle(err)
            }
        }
    }

    pub async fn get(&self, url: impl Into<String>) -> Result<ApiResponse> {
        self.request(RequestConfig::get(url)).await
    }

    /// GET with query parameters.
    pub async fn get_with<I, K, V>(&self, url: impl Into<String>, params: I) -> Result<ApiResponse>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.request(RequestConfig::get(url).params(params)).await
    }

    /// POST `data` as JSON.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        url: impl Into<String>,
        data: &T,
    ) -> Result<ApiResponse> {
        self.request(RequestConfig::post(url).json(data)?).await
    }

    /// PUT `data` as JSON.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        url: impl Into<String>,
        data: &T,
    ) -> Result<ApiResponse> {
        self.request(RequestConfig::put(url).json(data)?).await
    }

    /// PATCH `data` as JSON.
    pub async fn patch<T: Serialize + ?Sized>(
        &self,
        url: impl Into<String>,
        data: &T,
    ) -> Result<ApiResponse> {
        self.request(RequestConfig::patch(url).json(data)?).await
    }

    pub async fn delete(&self, url: impl Into<String>) -> Result<ApiResponse> {
        self.request(RequestConfig::delete(url)).await
    }

    /// Issue `method url` with an optional body on top of a base config
    /// (headers, params, timeout, cache override).
    pub async fn send(
        &self,
        method: Method,
        url: impl Into<String>,
        data: Option<RequestBody>,
        config: Option<RequestConfig>,
    ) -> Result<ApiResponse> {
        let url = url.into();
        let mut request = config.unwrap_or_else(|| RequestConfig::new(method.clone(), url.as_str()));
        request.method = method;
        request.url = url;
        if data.is_some() {
            request.data = data;
        }
        self.request(request).await
    }

    /// Apply client defaults: absolute URL, default headers, timeout.
    fn prepare(&self, mut request: RequestConfig) -> RequestConfig {
        let config = &self.inner.config;
        request.url = resolve_url(&config.base_url, &request.url);
        for (name, value) in &config.default_headers {
            let present = request
                .headers
                .keys()
                .any(|existing| existing.eq_ignore_ascii_case(name));
            if !present {
                request.headers.insert(name.clone(), value.clone());
            }
        }
        request.timeout.get_or_insert(config.timeout);
        request
    }

    async fn dispatch(&self, request: RequestConfig) -> Result<ApiResponse> {
        let inner = &self.inner;

        Url::parse(&request.url).map_err(|e| {
            HermodError::InvalidInput(format!("cannot resolve URL {:?}: {e}", request.url))
        })?;

        if !inner.rate_limiter.check_limit(&request.url) {
            let endpoint = endpoint_key(&request.url);
            inner.stats.record_rate_limited();
            metrics::counter!(telemetry::RATE_LIMITED_TOTAL,
                "endpoint" => endpoint.clone(),
            )
            .increment(1);
            return Err(HermodError::RateLimited { endpoint }.into());
        }

        let cacheable =
            request.method == Method::GET && request.cache.unwrap_or(inner.config.enable_caching);
        let cache_url = request.url.clone();
        let cache_params = request.params.clone();
        if cacheable
            && let Some(mut cached) = inner.cache.get(&cache_url, cache_params.as_ref()).await
        {
            debug!(url = %cache_url, "serving response from cache");
            cached.metadata.from_cache = true;
            inner.stats.record_cache_hit();
            return Ok(cached);
        }

        let request = self.transform_request(request)?;
        let request = inner.interceptors.request.apply(request).await?;

        let response = with_retry(&inner.retry, &inner.stats, &request, || {
            transport::send(&inner.http, &request, inner.config.timeout)
        })
        .await
        .map_err(|e| ErrorHandler::enhance(e, &request))?;

        let response = self.transform_response(response)?;
        let response = inner.interceptors.response.apply(response).await?;

        if cacheable && response.is_success() {
            inner
                .cache
                .set(
                    &cache_url,
                    cache_params.as_ref(),
                    response.clone(),
                    inner.cache.default_ttl(),
                )
                .await;
        }
        Ok(response)
    }

    fn transform_request(&self, request: RequestConfig) -> Result<RequestConfig> {
        let transformers = self
            .inner
            .request_transformers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        transformers.iter().try_fold(request, |req, f| f(req))
    }

    fn transform_response(&self, response: ApiResponse) -> Result<ApiResponse> {
        let transformers = self
            .inner
            .response_transformers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        transformers.iter().try_fold(response, |resp, f| f(resp))
    }

    // ========================================================================
    // Credentials and transformers
    // ========================================================================

    /// Send `Authorization: <kind> <token>` on subsequent requests.
    /// `kind` defaults to `Bearer`.
    pub fn set_auth_token(&self, token: impl Into<String>, kind: Option<&str>) {
        self.inner.credentials.set_auth(Some(AuthToken {
            kind: kind.unwrap_or("Bearer").to_string(),
            token: token.into(),
        }));
    }

    pub fn clear_auth_token(&self) {
        self.inner.credentials.set_auth(None);
    }

    /// Replace the CSRF token sent as `X-CSRF-TOKEN`.
    pub fn set_csrf_token(&self, token: impl Into<String>) {
        self.inner.credentials.set_csrf(Some(token.into()));
    }

    pub fn add_request_transformer<F>(&self, f: F)
    where
        F: Fn(RequestConfig) -> Result<RequestConfig> + Send + Sync + 'static,
    {
        self.inner
            .request_transformers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(f));
    }

    pub fn add_response_transformer<F>(&self, f: F)
    where
        F: Fn(ApiResponse) -> Result<ApiResponse> + Send + Sync + 'static,
    {
        self.inner
            .response_transformers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(f));
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn interceptors(&self) -> &Interceptors {
        &self.inner.interceptors
    }

    pub fn cache(&self) -> &ApiCache {
        &self.inner.cache
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.rate_limiter
    }

    pub fn logger(&self) -> &ApiLogger {
        &self.inner.logger
    }

    pub fn error_handler(&self) -> &ErrorHandler {
        &self.inner.error_handler
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Snapshot of the request counters.
    pub fn stats(&self) -> ClientStats {
        self.inner.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.inner.stats.reset();
    }

    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }
}

/// Resolve `url` against `base`.
///
/// Absolute URLs pass through unchanged; anything else is appended to
/// `base` with exactly one `/` between them.
pub fn resolve_url(base: &str, url: &str) -> String {
    if Url::parse(url).is_ok() {
        return url.to_string();
    }
    let base = base.trim_end_matches('/');
    let path = url.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}
