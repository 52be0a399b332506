//! Ordered request/response interceptor chains.
//!
//! An [`InterceptorChain`] is a pipeline of value-in, value-out stages.
//! Stages run strictly in registration order; each receives the output of
//! the previous one. When a stage's [`Interceptor::on_fulfilled`] fails,
//! the same stage's [`Interceptor::on_rejected`] gets a chance to recover;
//! if it does not, the error propagates and the remaining stages are
//! skipped.
//!
//! Handles returned by [`InterceptorChain::add`] are slot indices. Ejecting
//! clears the slot without shifting the others, so handles stay valid.
//!
//! # Example
//!
//! ```rust
//! use hermod::interceptor::{InterceptorChain, interceptor_fn};
//! use hermod::RequestConfig;
//!
//! # async fn demo() -> hermod::Result<()> {
//! let chain = InterceptorChain::<RequestConfig>::new();
//! let id = chain.add(interceptor_fn(|req: RequestConfig| Ok(req.header("X-Tenant", "acme"))));
//!
//! let req = chain.apply(RequestConfig::get("/users")).await?;
//! assert_eq!(req.headers["X-Tenant"], "acme");
//!
//! chain.eject(id);
//! # Ok(())
//! # }
//! ```

pub mod builtin;

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::types::{ApiResponse, RequestConfig};
use crate::{ApiError, Result};

/// One stage of an [`InterceptorChain`].
#[async_trait]
pub trait Interceptor<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Transform a value on its way through the chain.
    async fn on_fulfilled(&self, value: T) -> Result<T>;

    /// Recover from an error raised by [`on_fulfilled`](Self::on_fulfilled).
    ///
    /// Default: propagate the error unchanged.
    async fn on_rejected(&self, error: ApiError) -> Result<T> {
        Err(error)
    }
}

/// Stable handle for an installed interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorId(usize);

/// Ordered, ejectable list of interceptors for values of type `T`.
pub struct InterceptorChain<T: Send + 'static> {
    slots: RwLock<Vec<Option<Arc<dyn Interceptor<T>>>>>,
}

impl<T: Send + 'static> InterceptorChain<T> {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Append an interceptor; it runs after every one already installed.
    pub fn add(&self, interceptor: impl Interceptor<T> + 'static) -> InterceptorId {
        self.add_arc(Arc::new(interceptor))
    }

    pub fn add_arc(&self, interceptor: Arc<dyn Interceptor<T>>) -> InterceptorId {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.push(Some(interceptor));
        InterceptorId(slots.len() - 1)
    }

    /// Remove an interceptor. Returns `false` if the slot was already empty.
    pub fn eject(&self, id: InterceptorId) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.get_mut(id.0).and_then(Option::take).is_some()
    }

    /// Remove every interceptor. Previously issued handles become stale.
    pub fn clear(&self) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of live interceptors.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .flatten()
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `value` through every live interceptor in order.
    pub async fn apply(&self, value: T) -> Result<T> {
        // Snapshot so no lock is held across an await.
        let live: Vec<Arc<dyn Interceptor<T>>> = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .flatten()
            .cloned()
            .collect();

        let mut value = value;
        for interceptor in live {
            value = match interceptor.on_fulfilled(value).await {
                Ok(next) => next,
                Err(e) => interceptor.on_rejected(e).await?,
            };
        }
        Ok(value)
    }
}

impl<T: Send + 'static> Default for InterceptorChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Request and response chains used by the client.
#[derive(Default)]
pub struct Interceptors {
    pub request: InterceptorChain<RequestConfig>,
    pub response: InterceptorChain<ApiResponse>,
}

// ============================================================================
// Closure adapters
// ============================================================================

/// Interceptor backed by a synchronous transform.
pub struct FnInterceptor<F> {
    f: F,
}

/// Wrap a synchronous `T -> Result<T>` closure as an interceptor.
pub fn interceptor_fn<T, F>(f: F) -> FnInterceptor<F>
where
    F: Fn(T) -> Result<T> + Send + Sync,
{
    FnInterceptor { f }
}

#[async_trait]
impl<T, F> Interceptor<T> for FnInterceptor<F>
where
    T: Send + 'static,
    F: Fn(T) -> Result<T> + Send + Sync,
{
    async fn on_fulfilled(&self, value: T) -> Result<T> {
        (self.f)(value)
    }
}

/// Interceptor backed by an async closure returning a boxed future.
pub struct AsyncFnInterceptor<F> {
    f: F,
}

/// Wrap an async `T -> Result<T>` closure as an interceptor.
///
/// ```rust
/// use futures_util::FutureExt;
/// use hermod::interceptor::interceptor_async;
/// use hermod::RequestConfig;
///
/// let stage = interceptor_async(|req: RequestConfig| {
///     async move { Ok::<_, hermod::ApiError>(req.header("X-Trace", "1")) }.boxed()
/// });
/// # let _ = stage;
/// ```
pub fn interceptor_async<T, F>(f: F) -> AsyncFnInterceptor<F>
where
    F: Fn(T) -> BoxFuture<'static, Result<T>> + Send + Sync,
{
    AsyncFnInterceptor { f }
}

#[async_trait]
impl<T, F> Interceptor<T> for AsyncFnInterceptor<F>
where
    T: Send + 'static,
    F: Fn(T) -> BoxFuture<'static, Result<T>> + Send + Sync,
{
    async fn on_fulfilled(&self, value: T) -> Result<T> {
        (self.f)(value).await
    }
}
