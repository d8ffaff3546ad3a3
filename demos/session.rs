//! Sends one command over the interactive session endpoint and prints the reply.
//!
//! Run with:
//! ```sh
//! RUST_LOG=info cargo run --example session --features tracing -- ws://localhost:6969/ws/session
//! ```

use std::env;
use std::time::Duration;

use reconnecting_ws::ws::config::Keepalive;
use reconnecting_ws::ws::{TungsteniteTransport, probe};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_ENDPOINT: &str = "ws://localhost:6969/ws/session";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let endpoint = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());
    let request = json!({ "type": "input", "data": "help\n" });

    let exchange = probe::exchange(
        &TungsteniteTransport,
        &endpoint,
        Keepalive::default(),
        &request,
        Duration::from_secs(5),
    )
    .await?;

    info!(greeting = ?exchange.greeting, "Connected");
    info!(%request, "Sent help command");
    info!(reply = %exchange.reply, "Response");

    Ok(())
}
