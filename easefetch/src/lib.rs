//! Lifecycle management for a single asynchronous data fetch.
//!
//! A [`FetchController`] triggers a fetch, tracks in-flight, success and
//! failure state in a [`FetchState`], applies an optional transform, normalizes
//! errors to a display message and refetches whenever the fetch or transform
//! capability changes identity. Hosts observe it through [`FetchController::subscribe`].

mod config;
mod controller;
mod fetch_error;
mod fetch_result;
mod fetch_state;
mod fetch_store;
mod stream_ext;
pub mod mock;

#[cfg(test)]
mod unit_tests;

pub use config::*;
pub use controller::*;
pub use fetch_error::*;
pub use fetch_result::*;
pub use fetch_state::*;
pub use fetch_store::*;
pub use stream_ext::*;
