use crate::tracing_setup::tracing_init;
use easefetch::{ErrorRecord, ErrorResponse, FetchConfig, FetchController, FetchError};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
mod tracing_setup;

#[derive(Debug, Clone)]
struct Account {
    id: u32,
    owner: String,
}

#[derive(Debug, Clone)]
struct Greeting {
    text: String,
}

async fn load_account(id: u32) -> Result<Account, FetchError> {
    sleep(Duration::from_millis(200)).await;
    if id == 0 {
        return Err(FetchError::new("Request failed with status code 400").with_response(
            ErrorResponse::new(vec![ErrorRecord::described("account id must be positive")]),
        ));
    }
    Ok(Account {
        id,
        owner: "wmy".to_string(),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init();

    info!("==========================================");
    warn!("A. Fetch with a transform");

    let config = FetchConfig::builder(7)
        .fetch_with(load_account)
        .transform(|account: Account| Greeting {
            text: format!("hello {} (#{})", account.owner, account.id),
        })
        .build()?;
    let controller = FetchController::new(config);
    let subscription = controller.subscribe(|snapshot| {
        info!("  Host | render: {:?}", snapshot.state);
    });
    controller.start();
    let settled = controller.settled().await;
    info!("  Main | settled payload: {:?}", settled.payload);
    sleep(Duration::from_millis(50)).await;
    subscription.unsubscribe();

    info!("==========================================");
    warn!("B. Fetch failing with an API error body, then reload");

    let config = FetchConfig::builder(0)
        .fetch_with(load_account)
        .on_error(|error| warn!("  Host | on_error: {error} ({:?})", error.kind()))
        .build()?;
    let controller = FetchController::new(config);
    let _subscription = controller.subscribe(|snapshot| {
        info!("  Host | render: {:?}", snapshot.state);
    });
    if let Some(cycle) = controller.start() {
        cycle.finished().await;
    }
    info!(
        "  Main | last error: {:?}",
        controller.state().last_error
    );

    warn!("  Main | reloading through the handle");
    if let Some(cycle) = controller.reload_handle().reload() {
        cycle.finished().await;
    }
    sleep(Duration::from_millis(50)).await;

    info!("==========================================");
    info!("  Main | Finish");
    Ok(())
}
