use crate::{FetchState, FetchStreamExt};
use futures::stream::{self, StreamExt};

#[tokio::test]
async fn test_stop_if() {
    let items: Vec<i32> = stream::iter(1..10).stop_if(|&value| value >= 3).collect().await;
    assert_eq!(items, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_stop_if_on_exhausted_stream() {
    let items: Vec<i32> = stream::iter(1..3).stop_if(|&value| value > 5).collect().await;
    assert_eq!(items, vec![1, 2]);
}

#[tokio::test]
async fn test_until_settled() {
    let fetching = FetchState::<i32>::default().begin_fetch();
    let states = vec![
        fetching.clone(),
        fetching.clone().succeed(1),
        fetching.clone(),
        fetching.succeed(2),
    ];
    let seen: Vec<FetchState<i32>> = stream::iter(states).until_settled().collect().await;
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].payload, Some(1));
}
