//! Observability and Metrics
//!
//! Counters for frame traffic, negotiation, and map loading.
//!
//! Uses atomic counters so the transport task and any reporting task can share them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Global metrics collector for protocol operations
#[derive(Debug)]
pub struct Metrics {
    /// Frames dispatched from the server
    pub frames_received: AtomicU64,
    /// Bytes of dispatched frames, opcode included
    pub bytes_received: AtomicU64,
    /// Frames queued for the server
    pub frames_sent: AtomicU64,
    /// Bytes of queued frames
    pub bytes_sent: AtomicU64,
    /// Frames carrying an opcode with no registered handler
    pub unknown_opcodes: AtomicU64,
    /// Handlers that consumed a different byte count than their frame declared
    pub framing_errors: AtomicU64,
    /// Recognized extensions recorded during negotiation
    pub extensions_negotiated: AtomicU64,
    /// Map transfers started
    pub maps_started: AtomicU64,
    /// Map transfers finalised successfully
    pub maps_loaded: AtomicU64,
    /// Decompressed map bytes produced
    pub map_bytes_inflated: AtomicU64,
    /// Sessions ended through the disconnect signal
    pub disconnects: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            unknown_opcodes: AtomicU64::new(0),
            framing_errors: AtomicU64::new(0),
            extensions_negotiated: AtomicU64::new(0),
            maps_started: AtomicU64::new(0),
            maps_loaded: AtomicU64::new(0),
            map_bytes_inflated: AtomicU64::new(0),
            disconnects: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a dispatched frame
    pub fn frame_received(&self, byte_count: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record an outgoing frame
    pub fn frame_sent(&self, byte_count: u64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn unknown_opcode(&self) {
        self.unknown_opcodes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn framing_error(&self) {
        self.framing_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn extension_negotiated(&self) {
        self.extensions_negotiated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn map_started(&self) {
        self.maps_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn map_loaded(&self) {
        self.maps_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn map_inflated(&self, byte_count: u64) {
        self.map_bytes_inflated
            .fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            unknown_opcodes: self.unknown_opcodes.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            extensions_negotiated: self.extensions_negotiated.load(Ordering::Relaxed),
            maps_started: self.maps_started.load(Ordering::Relaxed),
            maps_loaded: self.maps_loaded.load(Ordering::Relaxed),
            map_bytes_inflated: self.map_bytes_inflated.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            frames_received = snapshot.frames_received,
            bytes_received = snapshot.bytes_received,
            frames_sent = snapshot.frames_sent,
            bytes_sent = snapshot.bytes_sent,
            unknown_opcodes = snapshot.unknown_opcodes,
            framing_errors = snapshot.framing_errors,
            extensions_negotiated = snapshot.extensions_negotiated,
            maps_started = snapshot.maps_started,
            maps_loaded = snapshot.maps_loaded,
            map_bytes_inflated = snapshot.map_bytes_inflated,
            disconnects = snapshot.disconnects,
            uptime_seconds = snapshot.uptime_seconds,
            "Protocol metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub bytes_received: u64,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub unknown_opcodes: u64,
    pub framing_errors: u64,
    pub extensions_negotiated: u64,
    pub maps_started: u64,
    pub maps_loaded: u64,
    pub map_bytes_inflated: u64,
    pub disconnects: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}
