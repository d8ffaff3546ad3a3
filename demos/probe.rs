//! Checks that log stream endpoints accept WebSocket upgrades and stream something.
//!
//! Run with:
//! ```sh
//! RUST_LOG=info cargo run --example probe --features tracing -- ws://localhost:6969/ws/logs/combined
//! ```

use std::env;
use std::time::Duration;

use reconnecting_ws::ws::config::Keepalive;
use reconnecting_ws::ws::{LogLineParser, TungsteniteTransport, probe};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_ENDPOINTS: [&str; 2] = [
    "ws://localhost:6969/ws/logs/combined",
    "ws://localhost:6969/ws/logs/service/karaf",
];
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const MESSAGE_TIMEOUT: Duration = Duration::from_secs(2);
const SAMPLE_SIZE: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut endpoints: Vec<String> = env::args().skip(1).collect();
    if endpoints.is_empty() {
        endpoints = DEFAULT_ENDPOINTS.map(str::to_owned).to_vec();
    }

    for endpoint in &endpoints {
        match probe::handshake(endpoint, HANDSHAKE_TIMEOUT).await {
            Ok(report) => info!(
                %endpoint,
                status = report.status,
                elapsed = ?report.elapsed,
                "WebSocket handshake successful"
            ),
            Err(e) => {
                warn!(%endpoint, error = %e, "WebSocket handshake failed");
                continue;
            }
        }

        match probe::sample(
            &TungsteniteTransport,
            &LogLineParser,
            endpoint,
            Keepalive::default(),
            SAMPLE_SIZE,
            MESSAGE_TIMEOUT,
        )
        .await
        {
            Ok(messages) => {
                for message in &messages {
                    info!(%endpoint, "Received: {}", message.preview());
                }
                info!(%endpoint, received = messages.len());
            }
            Err(e) => warn!(%endpoint, error = %e, "Unable to read messages"),
        }
    }

    Ok(())
}
