use crate::{FetchState, ReloadHandle, Snapshot};
use futures_signals::signal::{Mutable, MutableSignalCloned, SignalExt, SignalStream};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{trace, warn};

type Subscriber<P> = Arc<dyn Fn(&Snapshot<P>) + Send + Sync>;

struct Subscribers<P: Clone> {
    next_id: u64,
    // id -> (last version seen at subscribe time, subscriber)
    entries: BTreeMap<u64, (u64, Subscriber<P>)>,
}

impl<P: Clone> Subscribers<P> {
    fn new() -> Self {
        Subscribers {
            next_id: 0,
            entries: BTreeMap::new(),
        }
    }
}

/// Snapshots waiting for delivery, in transition order.
struct Outbox<P: Clone> {
    pending: VecDeque<(u64, FetchState<P>)>,
    draining: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the [`FetchState`] and delivers every transition to subscribers.
///
/// A transition is applied and handed to the subscribers before the call that
/// caused it returns. When a subscriber triggers another transition from
/// inside its callback (e.g. `reload`), the new snapshot is queued and
/// delivered once the current one has reached every subscriber, so ordering
/// holds and nothing deadlocks. If another thread is already delivering, that
/// thread delivers the queued snapshot instead.
pub struct FetchStore<P: Clone> {
    state: Mutable<FetchState<P>>,
    version: AtomicU64,
    outbox: Mutex<Outbox<P>>,
    subscribers: Arc<Mutex<Subscribers<P>>>,
    reload: ReloadHandle,
}

impl<P: Clone + Send + Sync + 'static> FetchStore<P> {
    pub(crate) fn new(reload: ReloadHandle) -> Self {
        FetchStore {
            state: Mutable::new(FetchState::default()),
            version: AtomicU64::new(0),
            outbox: Mutex::new(Outbox {
                pending: VecDeque::new(),
                draining: false,
            }),
            subscribers: Arc::new(Mutex::new(Subscribers::new())),
            reload,
        }
    }

    /// Applies `reducer` to the current state and delivers the result.
    pub(crate) fn transition<F>(&self, reducer: F) -> FetchState<P>
    where
        F: FnOnce(FetchState<P>) -> FetchState<P>,
    {
        let next = {
            let mut state = self.state.lock_mut();
            let next = reducer((*state).clone());
            *state = next.clone();
            // Queued while the lock is held so delivery order matches transition order.
            self.enqueue(next.clone());
            next
        };
        self.drain();
        next
    }

    /// Like [`FetchStore::transition`], but only when `condition` holds for the
    /// current state. The check and the update happen under one lock.
    pub(crate) fn transition_if<G, F>(&self, condition: G, reducer: F) -> Option<FetchState<P>>
    where
        G: FnOnce(&FetchState<P>) -> bool,
        F: FnOnce(FetchState<P>) -> FetchState<P>,
    {
        let next = {
            let mut state = self.state.lock_mut();
            if !condition(&*state) {
                return None;
            }
            let next = reducer((*state).clone());
            *state = next.clone();
            self.enqueue(next.clone());
            next
        };
        self.drain();
        Some(next)
    }

    fn enqueue(&self, state: FetchState<P>) {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.outbox).pending.push_back((version, state));
    }

    fn drain(&self) {
        {
            let mut outbox = lock(&self.outbox);
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        loop {
            let next = {
                let mut outbox = lock(&self.outbox);
                let next = outbox.pending.pop_front();
                if next.is_none() {
                    outbox.draining = false;
                }
                next
            };
            match next {
                Some((version, state)) => self.deliver(version, state),
                None => break,
            }
        }
    }

    fn deliver(&self, version: u64, state: FetchState<P>) {
        let snapshot = Snapshot {
            state,
            reload: self.reload.clone(),
        };
        // Subscribers only see transitions made after they subscribed.
        let current: Vec<Subscriber<P>> = lock(&self.subscribers)
            .entries
            .values()
            .filter(|(since, _)| version > *since)
            .map(|(_, subscriber)| subscriber.clone())
            .collect();
        trace!(
            version,
            subscribers = current.len(),
            is_fetching = snapshot.state.is_fetching,
            "delivering snapshot"
        );
        for subscriber in current {
            if catch_unwind(AssertUnwindSafe(|| subscriber(&snapshot))).is_err() {
                warn!(version, "subscriber panicked while handling a snapshot");
            }
        }
    }

    /// Registers `subscriber` for every following transition.
    ///
    /// The current state is not replayed. Delivery stops when the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe<F>(&self, subscriber: F) -> Subscription
    where
        F: Fn(&Snapshot<P>) + Send + Sync + 'static,
    {
        let id = {
            let mut subscribers = lock(&self.subscribers);
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            let since = self.version.load(Ordering::SeqCst);
            let subscriber: Subscriber<P> = Arc::new(subscriber);
            subscribers.entries.insert(id, (since, subscriber));
            id
        };
        let registry: Weak<Mutex<Subscribers<P>>> = Arc::downgrade(&self.subscribers);
        Subscription::new(move || {
            if let Some(subscribers) = registry.upgrade() {
                lock(&subscribers).entries.remove(&id);
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).entries.len()
    }

    /// Latest state only; intermediate states may be skipped.
    pub fn to_stream(&self) -> SignalStream<MutableSignalCloned<FetchState<P>>> {
        self.state.signal_cloned().to_stream()
    }

    /// Latest state only; intermediate states may be skipped.
    pub fn to_signal(&self) -> MutableSignalCloned<FetchState<P>> {
        self.state.signal_cloned()
    }

    pub fn get_state(&self) -> FetchState<P> {
        self.state.get_cloned()
    }
}

/// Handle returned by [`FetchStore::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Subscription {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keeps the subscriber registered for as long as the store lives.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
