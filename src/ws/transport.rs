//! Transport seam between the reconnecting client and the WebSocket library.
//!
//! [`ReconnectingClient`](super::ReconnectingClient) only ever talks to a [`Transport`] and the
//! [`Session`]s it opens, so the connection state machine can be driven by an in-memory
//! transport in tests and by [`TungsteniteTransport`] in production.

use async_trait::async_trait;
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until, timeout};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::config::Keepalive;
use super::error::WsError;
use crate::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens sessions against an endpoint.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Session: Session;

    /// Connect and complete the WebSocket handshake.
    async fn connect(&self, url: &str, keepalive: Keepalive) -> Result<Self::Session>;
}

/// An established, bidirectional message session.
#[async_trait]
pub trait Session: Send + 'static {
    /// Wait for the next inbound message.
    ///
    /// Returns `Ok(Some(text))` for a message, `Ok(None)` once the peer closed the session
    /// cleanly and `Err` when the session ended with an error. Must be cancel safe: dropping
    /// the returned future before completion loses no message.
    async fn receive(&mut self) -> Result<Option<String>>;

    /// Send a text message.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Close the session. Closing an already closed session succeeds.
    async fn close(&mut self) -> Result<()>;
}

/// Production transport backed by [`tokio_tungstenite`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

#[async_trait]
impl Transport for TungsteniteTransport {
    type Session = TungsteniteSession;

    /// Fails with [`WsError::Timeout`] if the handshake takes longer than `keepalive.timeout`.
    async fn connect(&self, url: &str, keepalive: Keepalive) -> Result<TungsteniteSession> {
        keepalive.validate()?;

        let (stream, _response) = timeout(keepalive.timeout, connect_async(url))
            .await
            .map_err(|_e| WsError::Timeout)??;
        Ok(TungsteniteSession::new(stream, keepalive))
    }
}

/// A [`tokio_tungstenite`] stream with PING/PONG liveness checks.
///
/// A PING is written every `keepalive.interval`; if no PONG arrives within `keepalive.timeout`
/// of it, [`Session::receive`] fails with [`WsError::Timeout`].
pub struct TungsteniteSession {
    stream: WsStream,
    keepalive: Keepalive,
    ping_interval: Interval,
    /// When the outstanding PING was sent
    awaiting_pong: Option<Instant>,
}

enum Event {
    Frame(Option<tungstenite::Result<Message>>),
    PingDue,
    PongOverdue,
}

impl TungsteniteSession {
    fn new(stream: WsStream, keepalive: Keepalive) -> Self {
        let mut ping_interval =
            interval_at(Instant::now() + keepalive.interval, keepalive.interval);
        ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            stream,
            keepalive,
            ping_interval,
            awaiting_pong: None,
        }
    }
}

#[async_trait]
impl Session for TungsteniteSession {
    async fn receive(&mut self) -> Result<Option<String>> {
        loop {
            let pong_deadline = self.awaiting_pong.map(|sent| sent + self.keepalive.timeout);

            let event = tokio::select! {
                frame = self.stream.next() => Event::Frame(frame),
                _ = self.ping_interval.tick() => Event::PingDue,
                () = sleep_until(pong_deadline.unwrap_or_else(Instant::now)), if pong_deadline.is_some() => {
                    Event::PongOverdue
                }
            };

            match event {
                Event::Frame(Some(Ok(Message::Text(text)))) => {
                    return Ok(Some(text.as_str().to_owned()));
                }
                Event::Frame(Some(Ok(Message::Binary(bytes)))) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
                }
                Event::Frame(Some(Ok(Message::Pong(_)))) => {
                    self.awaiting_pong = None;
                }
                Event::Frame(Some(Ok(Message::Close(_))) | None)
                | Event::Frame(Some(Err(
                    tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                ))) => return Ok(None),
                Event::Frame(Some(Err(e))) => return Err(e.into()),
                Event::Frame(Some(Ok(_))) => {
                    // Incoming PINGs are answered by tungstenite itself.
                }
                Event::PingDue => {
                    if self.awaiting_pong.is_none() {
                        self.stream.send(Message::Ping(Default::default())).await?;
                        self.awaiting_pong = Some(Instant::now());
                    }
                }
                Event::PongOverdue => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        "Keepalive timeout: no PONG received within {:?}",
                        self.keepalive.timeout
                    );
                    return Err(WsError::Timeout.into());
                }
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
