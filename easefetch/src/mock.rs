//! Test doubles for fetch capabilities and subscribers.

use crate::{FetchController, FetchError, Fetcher, Snapshot, Subscription};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout};

/// A scripted result, optionally delivered after a delay.
#[derive(Clone, Debug)]
struct MockedResponse<T> {
    result: Result<T, FetchError>,
    delay: Option<Duration>,
}

struct MockInner<T> {
    queued: Mutex<VecDeque<MockedResponse<T>>>,
    fallback: Mutex<Option<MockedResponse<T>>>,
    calls: AtomicUsize,
}

impl<T: Clone> MockInner<T> {
    fn next_response(&self) -> MockedResponse<T> {
        let queued = self
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        queued
            .or_else(|| {
                self.fallback
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
            })
            .unwrap_or(MockedResponse {
                result: Err(FetchError::new("no mocked response")),
                delay: None,
            })
    }
}

/// Fetch capability with scripted results and invocation counting.
///
/// Queued responses are consumed in order; once empty the fallback set with
/// [`MockFetcher::returning`] is used. Every call to [`MockFetcher::fetcher`]
/// produces a capability with a fresh identity sharing the same script.
#[derive(Clone)]
pub struct MockFetcher<T> {
    inner: Arc<MockInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> MockFetcher<T> {
    pub fn new() -> Self {
        MockFetcher {
            inner: Arc::new(MockInner {
                queued: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    pub fn returning(result: Result<T, FetchError>) -> Self {
        let mock = MockFetcher::new();
        *mock
            .inner
            .fallback
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(MockedResponse {
            result,
            delay: None,
        });
        mock
    }

    pub fn push(&self, result: Result<T, FetchError>) -> &Self {
        self.push_response(result, None)
    }

    pub fn push_after(&self, delay: Duration, result: Result<T, FetchError>) -> &Self {
        self.push_response(result, Some(delay))
    }

    fn push_response(&self, result: Result<T, FetchError>, delay: Option<Duration>) -> &Self {
        self.inner
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(MockedResponse { result, delay });
        self
    }

    /// Number of times any capability created by this mock was invoked.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn fetcher<C: 'static>(&self) -> Fetcher<C, T> {
        let inner = self.inner.clone();
        Fetcher::new(move |_params: C| {
            inner.calls.fetch_add(1, Ordering::SeqCst);
            let response = inner.next_response();
            async move {
                if let Some(delay) = response.delay {
                    sleep(delay).await;
                }
                response.result
            }
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Default for MockFetcher<T> {
    fn default() -> Self {
        MockFetcher::new()
    }
}

/// Subscriber that records every delivered snapshot in order.
pub struct SnapshotRecorder<P: Clone> {
    snapshot_rx: UnboundedReceiver<Snapshot<P>>,
    _subscription: Subscription,
}

impl<P: Clone + Send + Sync + 'static> SnapshotRecorder<P> {
    pub fn attach<C, T>(controller: &FetchController<C, T, P>) -> Self
    where
        C: Clone + Send + Sync + 'static,
        T: Send + 'static,
    {
        let (snapshot_tx, snapshot_rx) = tokio::sync::mpsc::unbounded_channel();
        let subscription = controller.subscribe(move |snapshot| {
            let _ = snapshot_tx.send(snapshot.clone());
        });
        SnapshotRecorder {
            snapshot_rx,
            _subscription: subscription,
        }
    }

    /// Next snapshot, or `None` if nothing arrives within a second.
    pub async fn next(&mut self) -> Option<Snapshot<P>> {
        self.next_within(Duration::from_secs(1)).await
    }

    pub async fn next_within(&mut self, wait: Duration) -> Option<Snapshot<P>> {
        timeout(wait, self.snapshot_rx.recv()).await.ok().flatten()
    }

    /// Snapshot already delivered, without waiting.
    pub fn try_next(&mut self) -> Option<Snapshot<P>> {
        self.snapshot_rx.try_recv().ok()
    }
}
