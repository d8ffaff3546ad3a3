//! Core WebSocket infrastructure.
//!
//! This module provides a reconnecting client that keeps a session to one endpoint alive,
//! plus the seams it is built on so that the transport and message decoding can be swapped.
//!
//! # Architecture
//!
//! - [`ReconnectingClient`]: connect → listen → backoff → reconnect loop with health statistics
//! - [`Transport`] / [`Session`]: the WebSocket library seam, implemented by [`TungsteniteTransport`]
//! - [`MessageParser`]: Trait for decoding incoming WebSocket messages
//! - [`probe`]: one-shot diagnostics that never retry
//!
//! # Example
//!
//! ```ignore
//! let client = ReconnectingClient::with_transport(config, TungsteniteTransport, LogLineParser)?;
//! let mut rx = client.subscribe();
//! let outcome = client.connect().await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod probe;
pub mod stats;
pub mod traits;
pub mod transport;

pub use connection::{ConnectionState, Outcome, ReconnectingClient};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use stats::RuntimeStats;
pub use traits::*;
pub use transport::{Session, Transport, TungsteniteSession, TungsteniteTransport};
