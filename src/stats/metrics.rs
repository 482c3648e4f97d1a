//! Statistics and metrics for relay sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Per-producer statistics
///
/// Counters are atomic so frames can be recorded under the relay's read lock.
#[derive(Debug)]
pub struct ProducerStats {
    /// When the producer attached
    pub started_at: Instant,
    frames: AtomicU64,
    bytes: AtomicU64,
}

impl ProducerStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// Record one inbound frame of `len` bytes
    pub fn record_frame(&self, len: usize) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Time since the producer attached
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Average inbound bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            (self.bytes() * 8) / secs
        } else {
            0
        }
    }
}

impl Default for ProducerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Relay-wide running totals
#[derive(Debug, Default)]
pub struct RelayCounters {
    producer_sessions: AtomicU64,
    viewer_sessions: AtomicU64,
    frames_relayed: AtomicU64,
    deliveries: AtomicU64,
    dropped_deliveries: AtomicU64,
    closed_deliveries: AtomicU64,
}

impl RelayCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_producer(&self) {
        self.producer_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_viewer(&self) {
        self.viewer_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one frame fan-out
    ///
    /// `delivered` viewers accepted it, `dropped` had a full buffer and
    /// `closed` had already disconnected.
    pub fn record_frame(&self, delivered: usize, dropped: usize, closed: usize) {
        self.frames_relayed.fetch_add(1, Ordering::Relaxed);
        self.deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.dropped_deliveries
            .fetch_add(dropped as u64, Ordering::Relaxed);
        self.closed_deliveries
            .fetch_add(closed as u64, Ordering::Relaxed);
    }

    /// Combine totals with the relay's current membership
    pub fn snapshot(&self, active_producers: usize, active_viewers: usize) -> RelayStats {
        RelayStats {
            active_producers,
            active_viewers,
            total_producer_sessions: self.producer_sessions.load(Ordering::Relaxed),
            total_viewer_sessions: self.viewer_sessions.load(Ordering::Relaxed),
            frames_relayed: self.frames_relayed.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            dropped_deliveries: self.dropped_deliveries.load(Ordering::Relaxed),
            closed_deliveries: self.closed_deliveries.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time relay statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
    /// Devices with an attached producer
    pub active_producers: usize,
    /// Open viewer connections across all devices
    pub active_viewers: usize,
    /// Producers ever attached
    pub total_producer_sessions: u64,
    /// Viewers ever subscribed
    pub total_viewer_sessions: u64,
    /// Frames accepted from producers
    pub frames_relayed: u64,
    /// Frame copies handed to viewer channels
    pub deliveries: u64,
    /// Frame copies lost to full viewer buffers
    pub dropped_deliveries: u64,
    /// Frame copies skipped because the viewer had disconnected
    pub closed_deliveries: u64,
}
