use crate::FetchState;
use futures_core::ready;
use futures_core::stream::Stream;
use pin_project::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Stream adaptors for observing fetch state.
pub trait FetchStreamExt: Stream {
    /// Yields items until (and including) the first one for which `test` is true.
    ///
    /// ```
    /// use futures_signals::signal::SignalExt;
    /// use easefetch::FetchStreamExt;
    ///
    /// async fn example() {
    ///     let stream = futures_signals::signal::always(0)
    ///         .to_stream()
    ///         .stop_if(|&value| value > 5);
    /// }
    /// ```
    fn stop_if<F>(self, test: F) -> StopIf<Self, F>
    where
        F: FnMut(&Self::Item) -> bool,
        Self: Sized,
    {
        StopIf {
            stream: self,
            stopped: false,
            test,
        }
    }

    /// Yields states until the first one with no cycle in flight.
    fn until_settled<P>(self) -> StopIf<Self, fn(&FetchState<P>) -> bool>
    where
        P: Clone,
        Self: Stream<Item = FetchState<P>> + Sized,
    {
        self.stop_if(not_fetching::<P> as fn(&FetchState<P>) -> bool)
    }
}

fn not_fetching<P: Clone>(state: &FetchState<P>) -> bool {
    !state.is_fetching
}

impl<T: ?Sized> FetchStreamExt for T where T: Stream {}

/// Stream returned by [`FetchStreamExt::stop_if`]. Ends after the first item
/// that passes the test, or when the inner stream ends.
#[pin_project]
#[derive(Debug)]
#[must_use = "Streams do nothing unless polled"]
pub struct StopIf<S, F> {
    #[pin]
    stream: S,
    stopped: bool,
    test: F,
}

impl<S, F> Stream for StopIf<S, F>
where
    S: Stream,
    F: FnMut(&S::Item) -> bool,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.stopped {
            return Poll::Ready(None);
        }
        let item = ready!(this.stream.poll_next(cx));
        *this.stopped = item.as_ref().map_or(true, |value| (this.test)(value));
        Poll::Ready(item)
    }
}
