use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Bridge observability counters.
///
/// Both flows update these lock-free; per-frame errors surface here and
/// in the log, never as control flow.
#[derive(Debug, Default)]
pub struct BridgeStats {
    frames_in: AtomicU64,
    bytes_in: AtomicU64,
    published: AtomicU64,
    frames_out: AtomicU64,
    bytes_out: AtomicU64,
    timesyncs_sent: AtomicU64,
    framing_errors: AtomicU64,
    unknown_topics: AtomicU64,
    unknown_channels: AtomicU64,
    schema_mismatches: AtomicU64,
    bus_errors: AtomicU64,
    reconnects: AtomicU64,
}

impl BridgeStats {
    pub fn record_frame_in(&self, wire_size: usize) {
        self.frames_in.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(wire_size as u64, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_out(&self, wire_size: usize) {
        self.frames_out.fetch_add(1, Ordering::Relaxed);
        self.bytes_out.fetch_add(wire_size as u64, Ordering::Relaxed);
    }

    pub fn record_timesync(&self) {
        self.timesyncs_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_framing_error(&self) {
        self.framing_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_topic(&self) {
        self.unknown_topics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_channel(&self) {
        self.unknown_channels.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_schema_mismatch(&self) {
        self.schema_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bus_error(&self) {
        self.bus_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time copy for reporting.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            frames_out: self.frames_out.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            timesyncs_sent: self.timesyncs_sent.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            unknown_topics: self.unknown_topics.load(Ordering::Relaxed),
            unknown_channels: self.unknown_channels.load(Ordering::Relaxed),
            schema_mismatches: self.schema_mismatches.load(Ordering::Relaxed),
            bus_errors: self.bus_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_in: u64,
    pub bytes_in: u64,
    pub published: u64,
    pub frames_out: u64,
    pub bytes_out: u64,
    pub timesyncs_sent: u64,
    pub framing_errors: u64,
    pub unknown_topics: u64,
    pub unknown_channels: u64,
    pub schema_mismatches: u64,
    pub bus_errors: u64,
    pub reconnects: u64,
}
