#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// State of a single fetch lifecycle as seen by the hosting layer.
///
/// Only the controller moves a `FetchState` between its phases; hosts receive
/// clones through snapshots and [`FetchStore::get_state`](crate::FetchStore::get_state).
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FetchState<P: Clone> {
    /// A fetch cycle is currently in flight.
    pub is_fetching: bool,
    /// Last successfully transformed result.
    pub payload: Option<P>,
    /// The most recent outcome invalidated any prior payload.
    pub did_invalidate: bool,
    /// The most recent completed fetch ended in error.
    pub last_fetch_failed: bool,
    /// Normalized message of the most recent error.
    pub last_error: Option<String>,
}

impl<P: Clone> FetchState<P> {
    /// Marks a cycle as in flight. Every other field keeps the previous outcome.
    pub fn begin_fetch(self) -> Self {
        FetchState {
            is_fetching: true,
            ..self
        }
    }

    pub fn succeed(self, payload: P) -> Self {
        FetchState {
            is_fetching: false,
            payload: Some(payload),
            did_invalidate: false,
            last_fetch_failed: false,
            last_error: None,
        }
    }

    /// Failed completion. The prior payload is not carried across a failure.
    pub fn fail(self, message: Option<String>) -> Self {
        FetchState {
            is_fetching: false,
            payload: None,
            did_invalidate: true,
            last_fetch_failed: true,
            last_error: message,
        }
    }

    /// Nothing has been fetched yet and nothing is in flight.
    pub fn is_idle(&self) -> bool {
        !self.is_fetching
            && self.payload.is_none()
            && !self.did_invalidate
            && !self.last_fetch_failed
            && self.last_error.is_none()
    }

    /// No cycle is in flight and at least one cycle has completed.
    pub fn is_settled(&self) -> bool {
        !self.is_fetching && (self.payload.is_some() || self.last_fetch_failed)
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub fn payload_ref(&self) -> Option<&P> {
        self.payload.as_ref()
    }
}

impl<P: Clone> Default for FetchState<P> {
    fn default() -> Self {
        FetchState {
            is_fetching: false,
            payload: None,
            did_invalidate: false,
            last_fetch_failed: false,
            last_error: None,
        }
    }
}
