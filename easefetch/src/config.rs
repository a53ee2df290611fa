use crate::{ErrorKind, FetchError, IntoFetchResult};
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

pub type FetchFuture<T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send>>;

/// Errors reported when a [`FetchConfig`] is built.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ConfigError {
    #[error("no fetch capability configured; use `fetch`, `fetch_with` or `noop_fetch`")]
    MissingFetch,
}

/// The fetch capability: turns the host parameters into a future result.
///
/// Identity is tied to the allocation made by [`Fetcher::new`]. Clones compare
/// equal, separately constructed fetchers never do, even when they behave the same.
pub struct Fetcher<C, T> {
    call: Arc<dyn Fn(C) -> FetchFuture<T> + Send + Sync>,
}

impl<C: 'static, T: 'static> Fetcher<C, T> {
    pub fn new<F, Fut, R>(fetch: F) -> Self
    where
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoFetchResult<T> + 'static,
    {
        Fetcher {
            call: Arc::new(move |params: C| -> FetchFuture<T> {
                let future = fetch(params);
                Box::pin(async move { future.await.into_fetch_result() })
            }),
        }
    }

    /// A fetcher resolving to `T::default()` without looking at the parameters.
    pub fn noop() -> Self
    where
        T: Default + Send,
    {
        Fetcher::new(|_| async { Ok::<T, FetchError>(T::default()) })
    }
}

impl<C, T> Fetcher<C, T> {
    pub(crate) fn call(&self, params: C) -> FetchFuture<T> {
        (self.call)(params)
    }

    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.call, &other.call)
    }
}

impl<C, T> Clone for Fetcher<C, T> {
    fn clone(&self) -> Self {
        Fetcher {
            call: self.call.clone(),
        }
    }
}

impl<C, T> fmt::Debug for Fetcher<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("id", &Arc::as_ptr(&self.call).cast::<()>())
            .finish()
    }
}

enum TransformFn<T, P> {
    Identity(fn(T) -> P),
    Custom(Arc<dyn Fn(T) -> Result<P, FetchError> + Send + Sync>),
}

/// Maps a raw fetch result into the payload kept in state.
pub struct Transform<T, P> {
    inner: TransformFn<T, P>,
}

impl<T> Transform<T, T> {
    /// Passes the raw result through. All identity transforms compare equal.
    pub fn identity() -> Self {
        Transform {
            inner: TransformFn::Identity(std::convert::identity),
        }
    }
}

impl<T: 'static, P: 'static> Transform<T, P> {
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(T) -> P + Send + Sync + 'static,
    {
        Transform {
            inner: TransformFn::Custom(Arc::new(move |raw: T| -> Result<P, FetchError> {
                Ok(transform(raw))
            })),
        }
    }

    /// A transform that may reject a successful fetch result.
    pub fn fallible<F, E>(transform: F) -> Self
    where
        F: Fn(T) -> Result<P, E> + Send + Sync + 'static,
        E: Into<FetchError> + 'static,
    {
        Transform {
            inner: TransformFn::Custom(Arc::new(move |raw: T| -> Result<P, FetchError> {
                transform(raw).map_err(|error| error.into().with_kind(ErrorKind::Transform))
            })),
        }
    }
}

impl<T, P> Transform<T, P> {
    /// Applies the transform. A panic inside it becomes a [`ErrorKind::Panicked`] error.
    pub(crate) fn apply(&self, raw: T) -> Result<P, FetchError> {
        match &self.inner {
            TransformFn::Identity(identity) => Ok(identity(raw)),
            TransformFn::Custom(transform) => catch_unwind(AssertUnwindSafe(|| transform(raw)))
                .unwrap_or_else(|panic| Err(FetchError::panicked(panic))),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.inner, TransformFn::Identity(_))
    }

    pub fn same_as(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (TransformFn::Identity(_), TransformFn::Identity(_)) => true,
            (TransformFn::Custom(a), TransformFn::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T, P> Clone for Transform<T, P> {
    fn clone(&self) -> Self {
        let inner = match &self.inner {
            TransformFn::Identity(identity) => TransformFn::Identity(*identity),
            TransformFn::Custom(transform) => TransformFn::Custom(transform.clone()),
        };
        Transform { inner }
    }
}

impl<T, P> fmt::Debug for Transform<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            TransformFn::Identity(_) => f.write_str("Transform::Identity"),
            TransformFn::Custom(transform) => f
                .debug_struct("Transform")
                .field("id", &Arc::as_ptr(transform).cast::<()>())
                .finish(),
        }
    }
}

/// Observer called with the raw error of every failed cycle.
#[derive(Clone)]
pub struct ErrorObserver {
    observe: Arc<dyn Fn(&FetchError) + Send + Sync>,
}

impl ErrorObserver {
    pub fn new<F>(observe: F) -> Self
    where
        F: Fn(&FetchError) + Send + Sync + 'static,
    {
        ErrorObserver {
            observe: Arc::new(observe),
        }
    }

    /// Calls the observer. A panicking observer is silently ignored.
    pub(crate) fn notify(&self, error: &FetchError) {
        let _ = catch_unwind(AssertUnwindSafe(|| (self.observe)(error)));
    }
}

impl fmt::Debug for ErrorObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorObserver")
    }
}

/// What happens when a cycle completes after a newer one was started.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum OverlapPolicy {
    /// Every cycle emits its final state; whichever completes last wins.
    #[default]
    LastWriteWins,
    /// Completions of cycles older than the newest started one are dropped.
    DiscardStale,
}

/// Everything a [`FetchController`](crate::FetchController) needs for a cycle.
///
/// `params` is opaque to the controller and handed to the fetcher by value.
pub struct FetchConfig<C, T, P = T> {
    params: C,
    fetcher: Fetcher<C, T>,
    transform: Transform<T, P>,
    on_error: Option<ErrorObserver>,
    overlap_policy: OverlapPolicy,
}

impl<C, T> FetchConfig<C, T, T> {
    pub fn builder(params: C) -> FetchConfigBuilder<C, T, T> {
        FetchConfigBuilder {
            params,
            fetcher: None,
            transform: Transform::identity(),
            on_error: None,
            overlap_policy: OverlapPolicy::default(),
        }
    }
}

impl<C, T, P> FetchConfig<C, T, P> {
    pub fn params(&self) -> &C {
        &self.params
    }

    pub fn fetcher(&self) -> &Fetcher<C, T> {
        &self.fetcher
    }

    pub fn transform(&self) -> &Transform<T, P> {
        &self.transform
    }

    pub fn on_error(&self) -> Option<&ErrorObserver> {
        self.on_error.as_ref()
    }

    pub fn overlap_policy(&self) -> OverlapPolicy {
        self.overlap_policy
    }

    /// Replaces the host parameters. Capability identities are kept.
    pub fn with_params(self, params: C) -> Self {
        FetchConfig { params, ..self }
    }

    pub fn with_fetcher(self, fetcher: Fetcher<C, T>) -> Self {
        FetchConfig { fetcher, ..self }
    }

    pub fn with_transform(self, transform: Transform<T, P>) -> Self {
        FetchConfig { transform, ..self }
    }

    pub fn with_on_error(self, on_error: Option<ErrorObserver>) -> Self {
        FetchConfig { on_error, ..self }
    }

    pub fn with_overlap_policy(self, overlap_policy: OverlapPolicy) -> Self {
        FetchConfig {
            overlap_policy,
            ..self
        }
    }

    /// True when moving from `previous` to `self` must trigger a new cycle,
    /// i.e. the fetch or transform capability identity differs.
    pub fn requires_refetch(&self, previous: &Self) -> bool {
        !self.fetcher.same_as(&previous.fetcher) || !self.transform.same_as(&previous.transform)
    }
}

impl<C: Clone, T, P> Clone for FetchConfig<C, T, P> {
    fn clone(&self) -> Self {
        FetchConfig {
            params: self.params.clone(),
            fetcher: self.fetcher.clone(),
            transform: self.transform.clone(),
            on_error: self.on_error.clone(),
            overlap_policy: self.overlap_policy,
        }
    }
}

impl<C: fmt::Debug, T, P> fmt::Debug for FetchConfig<C, T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchConfig")
            .field("params", &self.params)
            .field("fetcher", &self.fetcher)
            .field("transform", &self.transform)
            .field("on_error", &self.on_error)
            .field("overlap_policy", &self.overlap_policy)
            .finish()
    }
}

pub struct FetchConfigBuilder<C, T, P> {
    params: C,
    fetcher: Option<Fetcher<C, T>>,
    transform: Transform<T, P>,
    on_error: Option<ErrorObserver>,
    overlap_policy: OverlapPolicy,
}

impl<C: 'static, T: 'static, P> FetchConfigBuilder<C, T, P> {
    pub fn fetch(self, fetcher: Fetcher<C, T>) -> Self {
        FetchConfigBuilder {
            fetcher: Some(fetcher),
            ..self
        }
    }

    pub fn fetch_with<F, Fut, R>(self, fetch: F) -> Self
    where
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoFetchResult<T> + 'static,
    {
        self.fetch(Fetcher::new(fetch))
    }

    /// Explicitly opts into a fetcher that resolves to `T::default()`.
    pub fn noop_fetch(self) -> Self
    where
        T: Default + Send,
    {
        self.fetch(Fetcher::noop())
    }

    pub fn transform<Q: 'static, F>(self, transform: F) -> FetchConfigBuilder<C, T, Q>
    where
        F: Fn(T) -> Q + Send + Sync + 'static,
    {
        self.transform_with(Transform::new(transform))
    }

    pub fn try_transform<Q: 'static, F, E>(self, transform: F) -> FetchConfigBuilder<C, T, Q>
    where
        F: Fn(T) -> Result<Q, E> + Send + Sync + 'static,
        E: Into<FetchError> + 'static,
    {
        self.transform_with(Transform::fallible(transform))
    }

    /// Uses an existing transform, keeping its identity.
    pub fn transform_with<Q>(self, transform: Transform<T, Q>) -> FetchConfigBuilder<C, T, Q> {
        FetchConfigBuilder {
            params: self.params,
            fetcher: self.fetcher,
            transform,
            on_error: self.on_error,
            overlap_policy: self.overlap_policy,
        }
    }

    pub fn on_error<F>(self, observe: F) -> Self
    where
        F: Fn(&FetchError) + Send + Sync + 'static,
    {
        self.on_error_with(ErrorObserver::new(observe))
    }

    pub fn on_error_with(self, observer: ErrorObserver) -> Self {
        FetchConfigBuilder {
            on_error: Some(observer),
            ..self
        }
    }

    pub fn overlap_policy(self, overlap_policy: OverlapPolicy) -> Self {
        FetchConfigBuilder {
            overlap_policy,
            ..self
        }
    }

    pub fn build(self) -> Result<FetchConfig<C, T, P>, ConfigError> {
        let fetcher = self.fetcher.ok_or(ConfigError::MissingFetch)?;
        Ok(FetchConfig {
            params: self.params,
            fetcher,
            transform: self.transform,
            on_error: self.on_error,
            overlap_policy: self.overlap_policy,
        })
    }
}
