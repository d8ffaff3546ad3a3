use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time view of a client's health counters.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeStats {
    /// Inbound messages received across all sessions, decodable or not
    pub messages_received: u64,
    /// Failed connects, sessions that ended with an error and undecodable messages
    pub errors_encountered: u64,
    /// Reconnection attempts since the last successful connect
    pub reconnect_attempts: u32,
    /// Whether a session is currently open
    pub is_connected: bool,
}

/// Counters shared between the run loop and observers.
///
/// Written only by the run loop; any task may take a [`RuntimeStats`] snapshot.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    messages_received: AtomicU64,
    errors_encountered: AtomicU64,
    reconnect_attempts: AtomicU32,
    connected: AtomicBool,
}

impl Counters {
    pub(crate) fn record_message(&self) -> u64 {
        self.messages_received.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn record_error(&self) {
        self.errors_encountered.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Acquire)
    }

    pub(crate) fn next_reconnect_attempt(&self) -> u32 {
        self.reconnect_attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn reset_reconnect_attempts(&self) {
        self.reconnect_attempts.store(0, Ordering::Release);
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    pub(crate) fn snapshot(&self) -> RuntimeStats {
        RuntimeStats {
            messages_received: self.messages_received.load(Ordering::Acquire),
            errors_encountered: self.errors_encountered.load(Ordering::Acquire),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Acquire),
            is_connected: self.connected.load(Ordering::Acquire),
        }
    }
}
