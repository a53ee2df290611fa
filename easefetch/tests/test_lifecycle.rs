use crate::common::{next_states, record, summarize, Record, Summary};
use easefetch::mock::SnapshotRecorder;
use easefetch::{
    ErrorRecord, ErrorResponse, FetchConfig, FetchController, FetchError, FetchState,
    FetchStreamExt,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod common;

#[tokio::test]
async fn test_transform_scenario() {
    let config = FetchConfig::builder(())
        .fetch_with(|_: ()| async { Ok::<Record, FetchError>(record()) })
        .transform(summarize)
        .build()
        .unwrap();
    let controller: FetchController<(), Record, Summary> = FetchController::new(config);
    let mut recorder = SnapshotRecorder::attach(&controller);

    controller.start();

    let states = next_states(&mut recorder, 2).await;
    assert_eq!(
        states,
        vec![
            FetchState {
                is_fetching: true,
                ..FetchState::default()
            },
            FetchState {
                is_fetching: false,
                payload: Some(Summary {
                    test3: "data1".to_string()
                }),
                did_invalidate: false,
                last_fetch_failed: false,
                last_error: None,
            },
        ]
    );
}

#[tokio::test]
async fn test_api_error_scenario_with_reload() {
    let on_error_calls = Arc::new(AtomicUsize::new(0));
    let on_error_calls_clone = on_error_calls.clone();
    let config = FetchConfig::builder(())
        .fetch_with(|_: ()| async {
            Err::<Record, FetchError>(FetchError::empty().with_response(ErrorResponse::new(
                vec![ErrorRecord::described("error message from API")],
            )))
        })
        .on_error(move |_| {
            on_error_calls_clone.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let controller: FetchController<(), Record> = FetchController::new(config);
    let mut recorder = SnapshotRecorder::attach(&controller);

    controller.start();
    let states = next_states(&mut recorder, 2).await;
    assert_eq!(
        states[1],
        FetchState {
            is_fetching: false,
            payload: None,
            did_invalidate: true,
            last_fetch_failed: true,
            last_error: Some("error message from API".to_string()),
        }
    );
    assert_eq!(on_error_calls.load(Ordering::SeqCst), 1);

    controller.reload();
    let states = next_states(&mut recorder, 2).await;
    assert!(states[0].is_fetching);
    assert_eq!(states[0].last_error.as_deref(), Some("error message from API"));
    assert!(states[1].last_fetch_failed);
    assert_eq!(on_error_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stream_until_settled() {
    let config = FetchConfig::builder(())
        .fetch_with(|_: ()| async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok::<u8, FetchError>(9)
        })
        .build()
        .unwrap();
    let controller: FetchController<(), u8> = FetchController::new(config);
    controller.start();

    let last = controller
        .store()
        .to_stream()
        .until_settled()
        .collect::<Vec<_>>()
        .await
        .pop();
    assert_eq!(last.and_then(|state| state.payload), Some(9));
}
