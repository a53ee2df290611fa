use crate::tracing_setup::tracing_init;
use easefetch::{FetchConfig, FetchController, Fetcher, OverlapPolicy, Transform};
use futures_signals::signal::SignalExt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
mod tracing_setup;

async fn search(query: String) -> Result<Vec<String>, String> {
    let delay = 20 * query.len() as u64;
    sleep(Duration::from_millis(delay)).await;
    Ok(["apple", "apricot", "banana", "blueberry"]
        .iter()
        .filter(|fruit| fruit.starts_with(&query))
        .map(|fruit| fruit.to_string())
        .collect())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init();

    let fetcher = Fetcher::new(search);
    let config = FetchConfig::builder("ap".to_string())
        .fetch(fetcher.clone())
        .build()?;
    let controller = FetchController::new(config.clone());
    let _subscription = controller.subscribe(|snapshot| {
        info!(
            "  Host | fetching: {}, payload: {:?}",
            snapshot.state.is_fetching, snapshot.state.payload
        );
    });
    controller.start();
    controller.settled().await;

    info!("==========================================");
    warn!("A. New params only: no refetch until reload");
    let config = config.with_params("b".to_string());
    let refetched = controller.update_config(config.clone());
    info!("  Main | refetch triggered: {}", refetched.is_some());
    controller.reload().finished().await;

    info!("==========================================");
    warn!("B. New transform identity: refetch");
    let upper = Transform::new(|fruits: Vec<String>| {
        fruits.into_iter().map(|fruit| fruit.to_uppercase()).collect::<Vec<_>>()
    });
    let config = config.with_transform(upper);
    if let Some(cycle) = controller.update_config(config.clone()) {
        cycle.finished().await;
    }

    info!("==========================================");
    warn!("C. Overlapping cycles, last write wins");
    let slow = config.clone().with_params("blue".to_string());
    controller.update_config(slow.with_fetcher(Fetcher::new(search)));
    let fast = controller.config().with_params("a".to_string());
    controller.update_config(fast.with_fetcher(Fetcher::new(search)));
    controller.settled().await;
    sleep(Duration::from_millis(150)).await;
    info!("  Main | final: {:?}", controller.state().payload);

    info!("==========================================");
    warn!("D. Overlapping cycles, stale completions discarded");
    let guarded = FetchController::new(
        FetchConfig::builder("blue".to_string())
            .fetch(fetcher)
            .overlap_policy(OverlapPolicy::DiscardStale)
            .build()?,
    );
    guarded.start();
    let next = guarded.config().with_params("a".to_string());
    guarded.update_config(next.with_fetcher(Fetcher::new(search)));
    guarded
        .store()
        .to_signal()
        .stop_if(|state| !state.is_fetching)
        .for_each(|state| async move {
            info!("  Main | guarded state: {:?}", state);
        })
        .await;
    sleep(Duration::from_millis(150)).await;
    info!("  Main | final: {:?}", guarded.state().payload);

    info!("==========================================");
    info!("  Main | Finish");
    Ok(())
}
