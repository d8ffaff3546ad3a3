#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use bon::Builder;
use url::Url;

use crate::Result;
use crate::error::Error;

const DEFAULT_KEEPALIVE_INTERVAL_DURATION: Duration = Duration::from_secs(20);
const DEFAULT_KEEPALIVE_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_INITIAL_BACKOFF_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Configuration for a [`ReconnectingClient`](super::ReconnectingClient).
///
/// ```
/// use std::time::Duration;
/// use reconnecting_ws::ws::config::{ClientConfig, ReconnectConfig};
///
/// let config = ClientConfig::builder()
///     .endpoint("ws://localhost:6969/ws/logs/combined")
///     .reconnect(ReconnectConfig::default().with_max_attempts(3))
///     .build();
///
/// assert_eq!(config.reconnect.max_attempts, Some(3));
/// assert_eq!(config.keepalive.interval, Duration::from_secs(20));
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    /// Target `ws://` or `wss://` endpoint
    #[builder(into)]
    pub endpoint: String,
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
    /// Liveness probing for the underlying transport
    #[builder(default)]
    pub keepalive: Keepalive,
    /// Test instrumentation: close the session from the client side once this many messages
    /// have been received in total, forcing a reconnection. Leave unset outside of tests.
    pub self_close_after: Option<u64>,
}

impl ClientConfig {
    /// Configuration with every default and the given endpoint.
    #[must_use]
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        Self::builder().endpoint(endpoint).build()
    }

    /// Parse the endpoint, rejecting anything that is not a WebSocket URL.
    pub fn endpoint_url(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            scheme => Err(Error::validation(format!(
                "endpoint scheme must be ws or wss, got {scheme}"
            ))),
        }
    }

    /// Check everything the run loop relies on: the endpoint and the keepalive timings.
    pub fn validate(&self) -> Result<()> {
        self.endpoint_url()?;
        self.keepalive.validate()
    }
}

/// Keepalive interval/timeout pair applied by the transport.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keepalive {
    /// Interval between PING frames
    pub interval: Duration,
    /// Maximum time to wait for a PONG before considering the connection dead
    pub timeout: Duration,
}

impl Keepalive {
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Both durations must be non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::validation("keepalive interval must be non-zero"));
        }
        if self.timeout.is_zero() {
            return Err(Error::validation("keepalive timeout must be non-zero"));
        }
        Ok(())
    }
}

impl Default for Keepalive {
    fn default() -> Self {
        Self {
            interval: DEFAULT_KEEPALIVE_INTERVAL_DURATION,
            timeout: DEFAULT_KEEPALIVE_TIMEOUT_DURATION,
        }
    }
}

/// Configuration for automatic reconnection behavior.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive reconnection attempts before giving up.
    /// `None` means infinite retries.
    pub max_attempts: Option<u32>,
    /// Backoff duration before the first reconnection attempt
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl ReconnectConfig {
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    #[must_use]
    pub fn unlimited(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    #[must_use]
    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    #[must_use]
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Whether another attempt may be made after `attempts` consecutive ones.
    #[must_use]
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_RECONNECT_ATTEMPTS),
            initial_backoff: DEFAULT_INITIAL_BACKOFF_DURATION,
            max_backoff: DEFAULT_MAX_BACKOFF_DURATION,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl From<ReconnectConfig> for ExponentialBackoff {
    fn from(config: ReconnectConfig) -> Self {
        ExponentialBackoffBuilder::default()
            .with_initial_interval(config.initial_backoff.min(config.max_backoff))
            .with_max_interval(config.max_backoff)
            .with_multiplier(config.backoff_multiplier)
            // Delays follow min(initial * multiplier^(n-1), max) exactly
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None) // We handle max attempts separately
            .build()
    }
}
