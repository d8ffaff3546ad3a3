//! One-shot connectivity diagnostics.
//!
//! Unlike [`ReconnectingClient`](super::ReconnectingClient) these helpers connect exactly once,
//! never retry and return every failure to the caller.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite;

use super::config::Keepalive;
use super::error::WsError;
use super::traits::MessageParser;
use super::transport::{Session, Transport};
use crate::Result;
use crate::types::Payload;

/// Result of a successful WebSocket upgrade.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeReport {
    /// HTTP status returned for the upgrade request (`101 Switching Protocols`)
    pub status: u16,
    /// Time taken to connect and complete the handshake
    pub elapsed: Duration,
}

/// Messages exchanged by [`exchange`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// First message pushed by the server after connecting, if any arrived in time
    pub greeting: Option<String>,
    /// Server reply to the request
    pub reply: String,
}

/// Connect, complete the handshake and disconnect.
pub async fn handshake(url: &str, limit: Duration) -> Result<HandshakeReport> {
    let started = Instant::now();

    let (mut stream, response) = match timeout(limit, connect_async(url)).await {
        Ok(Ok(connected)) => connected,
        Ok(Err(tungstenite::Error::Http(response))) => {
            return Err(WsError::UnexpectedStatus(response.status().as_u16()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_elapsed) => return Err(WsError::Timeout.into()),
    };
    let elapsed = started.elapsed();

    if let Err(e) = stream.close(None).await {
        #[cfg(feature = "tracing")]
        tracing::debug!(error = %e, "Error closing probe connection");
        #[cfg(not(feature = "tracing"))]
        let _ = &e;
    }

    Ok(HandshakeReport {
        status: response.status().as_u16(),
        elapsed,
    })
}

/// Connect once and read up to `count` messages.
///
/// Reading stops early when the server closes the session or when no message arrives within
/// `wait`; whatever was received until then is returned.
pub async fn sample<T: Transport, P: MessageParser>(
    transport: &T,
    parser: &P,
    url: &str,
    keepalive: Keepalive,
    count: usize,
    wait: Duration,
) -> Result<Vec<Payload<P::Message>>> {
    let mut session = connect_within(transport, url, keepalive, wait).await?;
    let mut received = Vec::with_capacity(count);

    while received.len() < count {
        match timeout(wait, session.receive()).await {
            Ok(Ok(Some(text))) => {
                let (payload, _error) = parser.decode(text);
                received.push(payload);
            }
            Ok(Ok(None)) => break,
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) => {
                #[cfg(feature = "tracing")]
                tracing::info!(received = received.len(), "Timed out waiting for messages");
                break;
            }
        }
    }

    close_within(&mut session, wait).await;
    Ok(received)
}

/// Connect, take the server's greeting, send `request` and wait for one reply.
pub async fn exchange<T: Transport, R: Serialize>(
    transport: &T,
    url: &str,
    keepalive: Keepalive,
    request: &R,
    wait: Duration,
) -> Result<Exchange> {
    let payload = serde_json::to_string(request)?;
    let mut session = connect_within(transport, url, keepalive, wait).await?;

    let greeting = match timeout(wait, session.receive()).await {
        Ok(Ok(Some(text))) => Some(text),
        Ok(Ok(None)) => return Err(WsError::ConnectionClosed.into()),
        Ok(Err(e)) => return Err(e),
        Err(_elapsed) => None,
    };

    session.send(payload).await?;

    let reply = match timeout(wait, session.receive()).await {
        Ok(Ok(Some(text))) => text,
        Ok(Ok(None)) => return Err(WsError::ConnectionClosed.into()),
        Ok(Err(e)) => return Err(e),
        Err(_elapsed) => return Err(WsError::Timeout.into()),
    };

    close_within(&mut session, wait).await;
    Ok(Exchange { greeting, reply })
}

async fn connect_within<T: Transport>(
    transport: &T,
    url: &str,
    keepalive: Keepalive,
    wait: Duration,
) -> Result<T::Session> {
    timeout(wait, transport.connect(url, keepalive))
        .await
        .map_err(|_e| WsError::Timeout)?
}

async fn close_within<S: Session>(session: &mut S, wait: Duration) {
    if let Ok(Err(e)) = timeout(wait, session.close()).await {
        #[cfg(feature = "tracing")]
        tracing::debug!(error = %e, "Error closing probe session");
        #[cfg(not(feature = "tracing"))]
        let _ = &e;
    }
}
