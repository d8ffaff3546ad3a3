#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Not every integration test uses every helper"
)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reconnecting_ws::Result;
use reconnecting_ws::ws::config::{ClientConfig, Keepalive, ReconnectConfig};
use reconnecting_ws::ws::{Session, Transport, WsError};
use serde_json::json;
use tokio::time::Instant;

pub const ENDPOINT: &str = "ws://localhost:6969/ws/logs/combined";

/// What a scripted session does on successive `receive` calls.
///
/// Once the steps run out the session stays open and silent.
#[derive(Debug, Clone)]
pub enum Step {
    Message(String),
    Close,
    Fail,
}

/// Outcome of one scripted connect.
#[derive(Debug, Clone)]
pub enum Attempt {
    Refuse,
    Accept(Vec<Step>),
}

#[derive(Default)]
struct Inner {
    attempts: Mutex<VecDeque<Attempt>>,
    connect_times: Mutex<Vec<Instant>>,
    sent: Mutex<Vec<String>>,
    closes: AtomicUsize,
    stall_sends: AtomicBool,
}

/// In-memory [`Transport`] that plays back a script of connect outcomes.
///
/// Connects beyond the end of the script are refused.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Inner>,
}

impl ScriptedTransport {
    pub fn new<I: IntoIterator<Item = Attempt>>(attempts: I) -> Self {
        let transport = Self::default();
        transport
            .inner
            .attempts
            .lock()
            .unwrap()
            .extend(attempts);
        transport
    }

    /// Transport whose every connect is refused.
    pub fn refusing() -> Self {
        Self::default()
    }

    /// Make every session write block forever, as on a peer that stopped reading.
    #[must_use]
    pub fn with_stalled_sends(self) -> Self {
        self.inner.stall_sends.store(true, Ordering::SeqCst);
        self
    }

    pub fn connects(&self) -> usize {
        self.inner.connect_times.lock().unwrap().len()
    }

    /// Time between consecutive connect calls.
    pub fn connect_gaps(&self) -> Vec<Duration> {
        self.inner
            .connect_times
            .lock()
            .unwrap()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    pub fn sent(&self) -> Vec<String> {
        self.inner.sent.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Session = ScriptedSession;

    async fn connect(&self, _url: &str, _keepalive: Keepalive) -> Result<ScriptedSession> {
        self.inner.connect_times.lock().unwrap().push(Instant::now());

        let attempt = self
            .inner
            .attempts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Attempt::Refuse);

        match attempt {
            Attempt::Refuse => Err(WsError::ConnectionClosed.into()),
            Attempt::Accept(steps) => Ok(ScriptedSession {
                steps: steps.into(),
                inner: Arc::clone(&self.inner),
            }),
        }
    }
}

pub struct ScriptedSession {
    steps: VecDeque<Step>,
    inner: Arc<Inner>,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn receive(&mut self) -> Result<Option<String>> {
        match self.steps.pop_front() {
            Some(Step::Message(text)) => Ok(Some(text)),
            Some(Step::Close) => Ok(None),
            Some(Step::Fail) => Err(WsError::ConnectionClosed.into()),
            None => std::future::pending().await,
        }
    }

    async fn send(&mut self, text: String) -> Result<()> {
        if self.inner.stall_sends.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        self.inner.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
        self.steps.clear();
        Ok(())
    }
}

pub fn log_line(index: usize) -> Step {
    Step::Message(
        json!({
            "service": "karaf",
            "line": format!("line {index}"),
        })
        .to_string(),
    )
}

pub fn log_lines(count: usize) -> Vec<Step> {
    (0..count).map(log_line).collect()
}

pub fn config(max_attempts: u32) -> ClientConfig {
    ClientConfig::builder()
        .endpoint(ENDPOINT)
        .reconnect(ReconnectConfig::default().with_max_attempts(max_attempts))
        .build()
}

/// Poll `condition` every few (virtual) milliseconds until it holds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
