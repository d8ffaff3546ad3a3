//! Keeps a log stream open for a fixed time, reconnecting whenever it drops.
//!
//! Ctrl-C stops the client early. Final statistics are printed either way.
//!
//! Run with:
//! ```sh
//! RUST_LOG=info cargo run --example reconnect --features tracing -- ws://localhost:6969/ws/logs/combined
//! ```
//!
//! Set `SELF_CLOSE_AFTER=10` to have the client drop its own connection after ten messages and
//! exercise the reconnection path.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use reconnecting_ws::ws::ReconnectingClient;
use reconnecting_ws::ws::config::ClientConfig;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_ENDPOINT: &str = "ws://localhost:6969/ws/logs/combined";
const RUN_DURATION: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let endpoint = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());
    let self_close_after = env::var("SELF_CLOSE_AFTER")
        .ok()
        .map(|value| value.parse::<u64>())
        .transpose()?;

    info!(%endpoint, "Testing WebSocket endpoint");

    let config = ClientConfig::builder()
        .endpoint(endpoint)
        .maybe_self_close_after(self_close_after)
        .build();
    let client = Arc::new(ReconnectingClient::with_config(config)?);

    let runner = Arc::clone(&client);
    let mut run = tokio::spawn(async move { runner.connect().await });

    let finished = tokio::select! {
        result = &mut run => Some(result??),
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
            None
        }
        () = sleep(RUN_DURATION) => {
            info!(duration = ?RUN_DURATION, "Test completed");
            None
        }
    };

    client.close().await;
    let outcome = match finished {
        Some(outcome) => outcome,
        None => run.await??,
    };

    info!(
        ?outcome,
        stats = %serde_json::to_string(&client.stats())?,
        "Final stats"
    );

    Ok(())
}
