#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::time::{Duration, Instant};

use async_stream::try_stream;
use backoff::ExponentialBackoff;
use backoff::backoff::Backoff as _;
use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use super::config::ClientConfig;
use super::error::WsError;
use super::stats::{Counters, RuntimeStats};
use super::traits::{LogLineParser, MessageParser};
use super::transport::{Session, Transport, TungsteniteTransport};
use crate::Result;
use crate::error::Error;
use crate::types::Payload;

/// Broadcast channel capacity for incoming messages.
const BROADCAST_CAPACITY: usize = 1024;

/// Upper bound on closing a session, so a dead peer cannot stall shutdown.
const SESSION_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected: before the first connect, after shutdown or once retries are exhausted
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Successfully connected and listening
    Connected {
        /// When the connection was established
        since: Instant,
    },
    /// Waiting before the next reconnection attempt
    Backoff {
        /// Reconnection attempt about to be made
        attempt: u32,
        /// Time waited before making it
        delay: Duration,
    },
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Why [`ReconnectingClient::connect`] returned.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// [`ReconnectingClient::close`] was called
    ShutdownRequested,
    /// The reconnection budget ran out without a successful connect
    BudgetExhausted {
        /// Reconnection attempts made before giving up
        attempts: u32,
    },
}

/// How a single session ended.
enum SessionEnd {
    Shutdown,
    Closed,
    SelfClosed,
    Failed(Error),
}

enum ListenEvent {
    Shutdown,
    Outgoing(String),
    Received(Result<Option<String>>),
}

/// Keeps a WebSocket session to one endpoint alive, reconnecting with exponential backoff.
///
/// The run loop is [`connect`](Self::connect): it connects, listens until the session ends,
/// waits out the backoff and connects again, until [`close`](Self::close) is called or the
/// configured number of consecutive reconnection attempts is used up. Everything else
/// ([`stats`](Self::stats), [`state`](Self::state), [`send`](Self::send),
/// [`subscribe`](Self::subscribe), [`close`](Self::close)) may be called from other tasks
/// while the loop runs.
///
/// # Type Parameters
///
/// - `T`: [`Transport`] used to open sessions
/// - `P`: [`MessageParser`] used to decode inbound messages
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use reconnecting_ws::ws::ReconnectingClient;
///
/// # async fn example() -> reconnecting_ws::Result<()> {
/// let client = Arc::new(ReconnectingClient::new("ws://localhost:6969/ws/logs/combined")?);
///
/// let runner = Arc::clone(&client);
/// let run = tokio::spawn(async move { runner.connect().await });
///
/// tokio::signal::ctrl_c().await.ok();
/// client.close().await;
///
/// let outcome = run.await.expect("run loop panicked")?;
/// println!("{outcome:?}: {:?}", client.stats());
/// # Ok(())
/// # }
/// ```
pub struct ReconnectingClient<T = TungsteniteTransport, P = LogLineParser>
where
    T: Transport,
    P: MessageParser,
{
    config: ClientConfig,
    transport: T,
    parser: P,
    counters: Counters,
    /// Watch channel sender for state changes
    state_tx: watch::Sender<ConnectionState>,
    /// Cancelled by [`Self::close`]; once cancelled no reconnection is ever attempted again
    shutdown: CancellationToken,
    /// Sender channel for outgoing messages
    sender_tx: mpsc::UnboundedSender<String>,
    /// Receiver for outgoing messages, held by the run loop for as long as it runs
    sender_rx: Mutex<mpsc::UnboundedReceiver<String>>,
    /// Broadcast sender for incoming messages
    broadcast_tx: broadcast::Sender<Payload<P::Message>>,
}

impl ReconnectingClient {
    /// Client for `endpoint` with the default configuration, transport and parser.
    pub fn new<S: Into<String>>(endpoint: S) -> Result<Self> {
        Self::with_config(ClientConfig::new(endpoint))
    }

    /// Client with the default transport and parser.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, TungsteniteTransport, LogLineParser)
    }
}

impl<T, P> ReconnectingClient<T, P>
where
    T: Transport,
    P: MessageParser,
{
    /// Create a client over a custom transport and parser.
    ///
    /// Nothing is connected until [`Self::connect`] is awaited.
    pub fn with_transport(config: ClientConfig, transport: T, parser: P) -> Result<Self> {
        config.validate()?;

        let (sender_tx, sender_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            config,
            transport,
            parser,
            counters: Counters::default(),
            state_tx,
            shutdown: CancellationToken::new(),
            sender_tx,
            sender_rx: Mutex::new(sender_rx),
            broadcast_tx,
        })
    }

    /// Run the connection loop until shutdown or until the reconnection budget is exhausted.
    ///
    /// Connection failures, dropped sessions and undecodable messages are counted in
    /// [`Self::stats`] and retried, never returned. The only error is calling this while
    /// another call is still running.
    pub async fn connect(&self) -> Result<Outcome> {
        if self.shutdown.is_cancelled() {
            return Ok(Outcome::ShutdownRequested);
        }

        let Ok(mut sender_rx) = self.sender_rx.try_lock() else {
            return Err(Error::validation("connection loop is already running"));
        };

        self.counters.reset_reconnect_attempts();
        let mut backoff: ExponentialBackoff = self.config.reconnect.clone().into();

        let outcome = loop {
            self.state_tx.send_replace(ConnectionState::Connecting);

            #[cfg(feature = "tracing")]
            tracing::info!(endpoint = %self.config.endpoint, "Connecting");

            let connected = tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break Outcome::ShutdownRequested,
                result = self.transport.connect(&self.config.endpoint, self.config.keepalive) => result,
            };

            match connected {
                Ok(session) => {
                    self.counters.reset_reconnect_attempts();
                    backoff.reset();
                    self.counters.set_connected(true);
                    self.state_tx.send_replace(ConnectionState::Connected {
                        since: Instant::now(),
                    });

                    #[cfg(feature = "tracing")]
                    tracing::info!(endpoint = %self.config.endpoint, "WebSocket connection established");

                    let end = self.listen(session, &mut sender_rx).await;
                    self.counters.set_connected(false);

                    match end {
                        SessionEnd::Shutdown => break Outcome::ShutdownRequested,
                        SessionEnd::Closed => {
                            #[cfg(feature = "tracing")]
                            tracing::info!("WebSocket connection closed by peer");
                        }
                        SessionEnd::SelfClosed => {
                            #[cfg(feature = "tracing")]
                            tracing::info!("Message limit reached, closed connection to test reconnection");
                        }
                        SessionEnd::Failed(e) => {
                            self.counters.record_error();
                            #[cfg(feature = "tracing")]
                            tracing::warn!(error = %e, "WebSocket connection lost");
                            #[cfg(not(feature = "tracing"))]
                            let _ = &e;
                        }
                    }
                }
                Err(e) => {
                    self.counters.record_error();
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %e, "Connection failed");
                    #[cfg(not(feature = "tracing"))]
                    let _ = &e;
                }
            }

            if self.shutdown.is_cancelled() {
                break Outcome::ShutdownRequested;
            }

            let attempts = self.counters.reconnect_attempts();
            if !self.config.reconnect.allows(attempts) {
                #[cfg(feature = "tracing")]
                tracing::error!(attempts, "Max reconnection attempts reached");
                break Outcome::BudgetExhausted { attempts };
            }

            let attempt = self.counters.next_reconnect_attempt();
            let delay = backoff
                .next_backoff()
                .unwrap_or(self.config.reconnect.max_backoff);
            self.state_tx
                .send_replace(ConnectionState::Backoff { attempt, delay });

            #[cfg(feature = "tracing")]
            tracing::info!(attempt, ?delay, "Scheduling reconnection attempt");

            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break Outcome::ShutdownRequested,
                () = sleep(delay) => {}
            }
        };

        self.counters.set_connected(false);
        self.state_tx.send_replace(ConnectionState::Disconnected);

        #[cfg(feature = "tracing")]
        tracing::info!(?outcome, stats = ?self.stats(), "Connection loop finished");

        Ok(outcome)
    }

    /// Consume one session until it ends.
    async fn listen(
        &self,
        mut session: T::Session,
        sender_rx: &mut mpsc::UnboundedReceiver<String>,
    ) -> SessionEnd {
        loop {
            let event = tokio::select! {
                biased;

                () = self.shutdown.cancelled() => ListenEvent::Shutdown,
                Some(text) = sender_rx.recv() => ListenEvent::Outgoing(text),
                received = session.receive() => ListenEvent::Received(received),
            };

            match event {
                ListenEvent::Shutdown => {
                    Self::close_session(&mut session).await;
                    return SessionEnd::Shutdown;
                }
                ListenEvent::Outgoing(text) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(%text, "Sending WebSocket text message");

                    let sent = tokio::select! {
                        biased;

                        () = self.shutdown.cancelled() => None,
                        result = session.send(text) => Some(result),
                    };

                    match sent {
                        None => {
                            Self::close_session(&mut session).await;
                            return SessionEnd::Shutdown;
                        }
                        Some(Err(e)) => return SessionEnd::Failed(e),
                        Some(Ok(())) => {}
                    }
                }
                ListenEvent::Received(Ok(Some(text))) => {
                    if self.handle_message(text) {
                        Self::close_session(&mut session).await;
                        return SessionEnd::SelfClosed;
                    }
                }
                ListenEvent::Received(Ok(None)) => return SessionEnd::Closed,
                ListenEvent::Received(Err(e)) => return SessionEnd::Failed(e),
            }
        }
    }

    /// Count, decode, log and publish one message. Returns whether the self-close hook fired.
    fn handle_message(&self, text: String) -> bool {
        let received = self.counters.record_message();

        let (payload, error) = self.parser.decode(text);
        if let Some(e) = error {
            self.counters.record_error();
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %e, "Undecodable message, keeping raw text");
            #[cfg(not(feature = "tracing"))]
            let _ = &e;
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Received: {}", payload.preview());

        _ = self.broadcast_tx.send(payload);

        self.config
            .self_close_after
            .is_some_and(|limit| received == limit)
    }

    async fn close_session(session: &mut T::Session) {
        match timeout(SESSION_CLOSE_TIMEOUT, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %e, "Error while closing WebSocket session");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
            }
            Err(_elapsed) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Timed out closing WebSocket session");
            }
        }
    }

    /// Stop the client and wait for it to wind down.
    ///
    /// No reconnection is attempted after this is called, including one whose backoff is
    /// currently being waited out. If a run loop is active this resolves once it has closed its
    /// session and returned. Calling it again, or on a client that never connected, is a no-op.
    pub async fn close(&self) {
        self.shutdown.cancel();
        // The run loop owns the outgoing receiver until it returns.
        drop(self.sender_rx.lock().await);
    }

    /// Whether [`Self::close`] has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Snapshot of the health counters.
    #[must_use]
    pub fn stats(&self) -> RuntimeStats {
        self.counters.snapshot()
    }

    /// The configuration this client was created with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Check if a session is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to decoded incoming messages.
    ///
    /// Each call returns a new independent receiver that sees messages published after it was
    /// created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Payload<P::Message>> {
        self.broadcast_tx.subscribe()
    }

    /// Stream of decoded incoming messages.
    ///
    /// The stream yields [`WsError::Lagged`] and ends if the consumer falls more than the
    /// channel capacity behind, and ends when the client is dropped.
    pub fn messages(&self) -> impl Stream<Item = Result<Payload<P::Message>>> + use<T, P> {
        let mut rx = self.broadcast_tx.subscribe();

        try_stream! {
            loop {
                match rx.recv().await {
                    Ok(payload) => yield payload,
                    Err(RecvError::Lagged(n)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Message stream lagged, missed {n} messages");
                        Err(WsError::Lagged { count: n })?;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Queue a request to be sent as JSON over the current (or next) session.
    pub fn send<R: Serialize>(&self, request: &R) -> Result<()> {
        let json = serde_json::to_string(request)?;
        self.send_text(json)
    }

    /// Queue a text message to be sent over the current (or next) session.
    pub fn send_text<S: Into<String>>(&self, text: S) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(WsError::ConnectionClosed.into());
        }

        self.sender_tx
            .send(text.into())
            .map_err(|_e| WsError::ConnectionClosed)?;
        Ok(())
    }
}
