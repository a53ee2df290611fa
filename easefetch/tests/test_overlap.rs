use crate::common::next_states;
use easefetch::mock::{MockFetcher, SnapshotRecorder};
use easefetch::{FetchConfig, FetchController, FetchError, OverlapPolicy};
use std::time::Duration;

mod common;

fn slow_then_fast() -> MockFetcher<u32> {
    let mock = MockFetcher::new();
    mock.push_after(Duration::from_millis(150), Ok(1))
        .push_after(Duration::from_millis(10), Ok(2));
    mock
}

#[tokio::test]
async fn test_reload_while_in_flight_last_write_wins() {
    let mock = slow_then_fast();
    let config = FetchConfig::builder(())
        .fetch(mock.fetcher())
        .build()
        .unwrap();
    let controller: FetchController<(), u32> = FetchController::new(config);
    let mut recorder = SnapshotRecorder::attach(&controller);

    let first = controller.start().unwrap();
    let second = controller.reload();
    assert!(second.id() > first.id());
    second.finished().await;
    first.finished().await;

    let states = next_states(&mut recorder, 4).await;
    assert!(states[0].is_fetching);
    assert!(states[1].is_fetching);
    assert_eq!(states[2].payload, Some(2));
    // The earlier cycle resolves last and overwrites the newer result.
    assert_eq!(states[3].payload, Some(1));
    assert_eq!(controller.state().payload, Some(1));
    assert_eq!(mock.calls(), 2);
}

#[tokio::test]
async fn test_reload_while_in_flight_discard_stale() {
    let mock = slow_then_fast();
    let config = FetchConfig::builder(())
        .fetch(mock.fetcher())
        .overlap_policy(OverlapPolicy::DiscardStale)
        .build()
        .unwrap();
    let controller: FetchController<(), u32> = FetchController::new(config);
    let mut recorder = SnapshotRecorder::attach(&controller);

    let first = controller.start().unwrap();
    let second = controller.reload();
    second.finished().await;
    first.finished().await;

    let states = next_states(&mut recorder, 3).await;
    assert!(states[0].is_fetching);
    assert!(states[1].is_fetching);
    assert_eq!(states[2].payload, Some(2));
    assert!(recorder
        .next_within(Duration::from_millis(50))
        .await
        .is_none());
    assert_eq!(controller.state().payload, Some(2));
}

#[tokio::test]
async fn test_stale_failure_still_reaches_on_error() {
    let mock = MockFetcher::new();
    mock.push_after(Duration::from_millis(100), Err(FetchError::new("late")))
        .push(Ok(7));
    let (error_tx, mut error_rx) = tokio::sync::mpsc::unbounded_channel();
    let config = FetchConfig::builder(())
        .fetch(mock.fetcher())
        .on_error(move |error| {
            let _ = error_tx.send(error.to_string());
        })
        .overlap_policy(OverlapPolicy::DiscardStale)
        .build()
        .unwrap();
    let controller: FetchController<(), u32> = FetchController::new(config);

    let first = controller.start().unwrap();
    controller.reload().finished().await;
    first.finished().await;

    assert_eq!(error_rx.recv().await.as_deref(), Some("late"));
    let state = controller.state();
    assert_eq!(state.payload, Some(7));
    assert!(!state.last_fetch_failed);
}
