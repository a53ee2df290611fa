use crate::{
    FetchConfig, FetchError, FetchState, FetchStore, FetchStreamExt, OverlapPolicy, Subscription,
};
use futures_core::Stream;
use std::fmt;
use std::future::poll_fn;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;
use tracing::debug;

/// What a subscriber receives on every transition.
#[derive(Clone, Debug)]
pub struct Snapshot<P: Clone> {
    pub state: FetchState<P>,
    pub reload: ReloadHandle,
}

/// Starts a new fetch cycle on the controller it came from.
///
/// Holds no strong reference; reloading after the controller is gone does nothing.
#[derive(Clone)]
pub struct ReloadHandle {
    trigger: Arc<dyn Fn() -> Option<FetchCycle> + Send + Sync>,
}

impl ReloadHandle {
    pub(crate) fn new<F>(trigger: F) -> Self
    where
        F: Fn() -> Option<FetchCycle> + Send + Sync + 'static,
    {
        ReloadHandle {
            trigger: Arc::new(trigger),
        }
    }

    pub fn reload(&self) -> Option<FetchCycle> {
        (self.trigger)()
    }
}

impl fmt::Debug for ReloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReloadHandle")
    }
}

/// A running fetch cycle. Dropping it does not cancel the cycle.
#[derive(Debug)]
pub struct FetchCycle {
    id: u64,
    handle: JoinHandle<()>,
}

impl FetchCycle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits until the cycle has applied its final transition (or been discarded as stale).
    pub async fn finished(self) {
        let _ = self.handle.await;
    }
}

struct Inner<C, T, P: Clone> {
    config: Mutex<FetchConfig<C, T, P>>,
    store: FetchStore<P>,
    reload: ReloadHandle,
    started: AtomicBool,
    latest_cycle: AtomicU64,
}

/// Drives the lifecycle of a single asynchronous fetch.
///
/// Every cycle emits an in-flight state first and exactly one final state
/// afterwards (unless discarded under [`OverlapPolicy::DiscardStale`]).
/// Overlapping cycles are not guarded against by default: the last one to
/// complete wins. Cycles run on Tokio tasks, so `start`, `reload` and a
/// refetching `update_config` must be called inside a Tokio runtime.
pub struct FetchController<C, T, P: Clone = T> {
    inner: Arc<Inner<C, T, P>>,
}

impl<C, T, P> FetchController<C, T, P>
where
    C: Clone + Send + Sync + 'static,
    T: Send + 'static,
    P: Clone + Send + Sync + 'static,
{
    /// Creates an idle controller. Call [`FetchController::start`] after
    /// subscribing to trigger the initial fetch.
    pub fn new(config: FetchConfig<C, T, P>) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner<C, T, P>>| {
            let weak = weak.clone();
            let reload = ReloadHandle::new(move || weak.upgrade().map(|inner| inner.do_fetch()));
            Inner {
                config: Mutex::new(config),
                store: FetchStore::new(reload.clone()),
                reload,
                started: AtomicBool::new(false),
                latest_cycle: AtomicU64::new(0),
            }
        });
        FetchController { inner }
    }

    /// Triggers the initial fetch. Only the first call has an effect.
    pub fn start(&self) -> Option<FetchCycle> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!("fetch controller already started");
            return None;
        }
        Some(self.inner.do_fetch())
    }

    /// Starts a new cycle with the current configuration, even while another
    /// cycle is still in flight.
    pub fn reload(&self) -> FetchCycle {
        self.inner.do_fetch()
    }

    /// Replaces the configuration. A new cycle starts when the fetch or the
    /// transform capability differs by identity from the previous one.
    pub fn update_config(&self, next: FetchConfig<C, T, P>) -> Option<FetchCycle> {
        let refetch = {
            let mut config = self.inner.lock_config();
            let refetch = next.requires_refetch(&config);
            *config = next;
            refetch
        };
        if refetch {
            debug!("fetch capability changed, refetching");
            Some(self.inner.do_fetch())
        } else {
            None
        }
    }

    pub fn config(&self) -> FetchConfig<C, T, P> {
        self.inner.lock_config().clone()
    }

    pub fn state(&self) -> FetchState<P> {
        self.inner.store.get_state()
    }

    pub fn subscribe<F>(&self, subscriber: F) -> Subscription
    where
        F: Fn(&Snapshot<P>) + Send + Sync + 'static,
    {
        self.inner.store.subscribe(subscriber)
    }

    pub fn reload_handle(&self) -> ReloadHandle {
        self.inner.reload.clone()
    }

    pub fn store(&self) -> &FetchStore<P> {
        &self.inner.store
    }

    /// Resolves with the first observed state that has no cycle in flight.
    ///
    /// It does not wait for a cycle to begin: before [`FetchController::start`]
    /// the idle default is returned straight away.
    pub async fn settled(&self) -> FetchState<P> {
        let mut settled = self.state();
        let mut states = pin!(self.inner.store.to_stream().until_settled());
        while let Some(state) = poll_fn(|cx| states.as_mut().poll_next(cx)).await {
            settled = state;
        }
        settled
    }
}

impl<C, T, P> Inner<C, T, P>
where
    C: Clone + Send + Sync + 'static,
    T: Send + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn lock_config(&self) -> MutexGuard<'_, FetchConfig<C, T, P>> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn do_fetch(self: &Arc<Self>) -> FetchCycle {
        let id = self.latest_cycle.fetch_add(1, Ordering::SeqCst) + 1;
        let config = self.lock_config().clone();

        self.store.transition(FetchState::begin_fetch);
        debug!(cycle = id, "fetch cycle started");

        let inner = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = Self::run(&config).await;
            inner.complete(id, &config, outcome);
        });
        FetchCycle { id, handle }
    }

    async fn run(config: &FetchConfig<C, T, P>) -> Result<P, FetchError> {
        let fetcher = config.fetcher().clone();
        let params = config.params().clone();
        let future = catch_unwind(AssertUnwindSafe(|| fetcher.call(params)))
            .map_err(FetchError::panicked)?;
        let raw = match tokio::spawn(future).await {
            Ok(result) => result?,
            Err(join_error) => {
                return Err(match join_error.try_into_panic() {
                    Ok(panic) => FetchError::panicked(panic),
                    Err(join_error) => FetchError::new(join_error.to_string()),
                })
            }
        };
        config.transform().apply(raw)
    }

    fn complete(&self, id: u64, config: &FetchConfig<C, T, P>, outcome: Result<P, FetchError>) {
        let failed = outcome.is_err();
        let outcome = outcome.map_err(|error| {
            if let Some(observer) = config.on_error() {
                observer.notify(&error);
            }
            error.normalized_message()
        });
        let applied = match config.overlap_policy() {
            OverlapPolicy::LastWriteWins => {
                self.store.transition(|state| settle(state, outcome));
                true
            }
            OverlapPolicy::DiscardStale => self
                .store
                .transition_if(
                    |_| self.latest_cycle.load(Ordering::SeqCst) == id,
                    |state| settle(state, outcome),
                )
                .is_some(),
        };
        if applied {
            debug!(cycle = id, failed, "fetch cycle finished");
        } else {
            debug!(cycle = id, failed, "stale fetch cycle discarded");
        }
    }
}

fn settle<P: Clone>(state: FetchState<P>, outcome: Result<P, Option<String>>) -> FetchState<P> {
    match outcome {
        Ok(payload) => state.succeed(payload),
        Err(message) => state.fail(message),
    }
}

impl<C, T, P: Clone> fmt::Debug for FetchController<C, T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchController")
            .field("latest_cycle", &self.inner.latest_cycle.load(Ordering::SeqCst))
            .field("started", &self.inner.started.load(Ordering::SeqCst))
            .finish()
    }
}
