//! Per-connection traffic counters.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Point-in-time copy of a connection's counters.
///
/// Byte counts are wire bytes, headers and masking keys included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Frames written to the outbound queue.
    pub frames_sent: u64,
    /// Frames decoded from the peer.
    pub frames_received: u64,
    /// Bytes written to the outbound queue.
    pub bytes_sent: u64,
    /// Bytes consumed by the frame decoder.
    pub bytes_received: u64,
    /// Pings sent, automatic or explicit.
    pub pings_sent: u64,
    /// Pings received.
    pub pings_received: u64,
    /// Pongs sent, including automatic replies.
    pub pongs_sent: u64,
    /// Pongs received.
    pub pongs_received: u64,
    /// Time between the last explicit ping and the pong that followed it.
    pub last_rtt: Option<Duration>,
}

/// Shared counters behind their own lock, so readers never wait on the
/// connection's state lock.
#[derive(Debug, Default)]
pub(crate) struct StatsTracker {
    inner: Mutex<Statistics>,
}

impl StatsTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut Statistics)) {
        let mut stats = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }

    pub(crate) fn record_sent(&self, frames: u64, bytes: usize) {
        self.update(|s| {
            s.frames_sent += frames;
            s.bytes_sent += bytes as u64;
        });
    }

    pub(crate) fn record_received(&self, bytes: usize) {
        self.update(|s| {
            s.frames_received += 1;
            s.bytes_received += bytes as u64;
        });
    }

    pub(crate) fn record_ping_sent(&self) {
        self.update(|s| s.pings_sent += 1);
    }

    pub(crate) fn record_ping_received(&self) {
        self.update(|s| s.pings_received += 1);
    }

    pub(crate) fn record_pong_sent(&self) {
        self.update(|s| s.pongs_sent += 1);
    }

    pub(crate) fn record_pong_received(&self, rtt: Option<Duration>) {
        self.update(|s| {
            s.pongs_received += 1;
            if rtt.is_some() {
                s.last_rtt = rtt;
            }
        });
    }

    /// Copy all counters under one lock acquisition.
    pub(crate) fn snapshot(&self) -> Statistics {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
