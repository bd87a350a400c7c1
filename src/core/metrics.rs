//! Relay metrics for diagnostics
//!
//! Counters shared by producers and the consumer. Every record that passes
//! the level filter ends up counted exactly once as either written or
//! dropped once the relay is shut down.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing relay health
///
/// # Example
///
/// ```
/// use log_relay::RelayMetrics;
///
/// let metrics = RelayMetrics::new();
/// metrics.record_enqueued();
/// metrics.record_dropped();
///
/// assert_eq!(metrics.total_enqueued(), 1);
/// assert_eq!(metrics.dropped_count(), 1);
/// ```
#[derive(Debug)]
pub struct RelayMetrics {
    /// Records dropped: channel full, pending buffer full, or abandoned at shutdown
    dropped_count: AtomicU64,

    /// Records accepted onto the relay channel
    total_enqueued: AtomicU64,

    /// Records handed to at least one sink without error
    total_written: AtomicU64,

    /// Number of times the channel was found full
    queue_full_events: AtomicU64,

    /// Failed or panicking sink calls
    sink_errors: AtomicU64,
}

impl RelayMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            dropped_count: AtomicU64::new(0),
            total_enqueued: AtomicU64::new(0),
            total_written: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            sink_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn total_enqueued(&self) -> u64 {
        self.total_enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn total_written(&self) -> u64 {
        self.total_written.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_errors(&self) -> u64 {
        self.sink_errors.load(Ordering::Relaxed)
    }

    /// Record a dropped record, returning the previous count
    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped_many(&self, count: u64) {
        self.dropped_count.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_enqueued(&self) -> u64 {
        self.total_enqueued.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_written(&self) -> u64 {
        self.total_written.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_error(&self) -> u64 {
        self.sink_errors.fetch_add(1, Ordering::Relaxed)
    }

    /// Get drop rate as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been enqueued or dropped.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped_count() as f64;
        let total = self.total_enqueued() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RelayMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            dropped_count: AtomicU64::new(self.dropped_count()),
            total_enqueued: AtomicU64::new(self.total_enqueued()),
            total_written: AtomicU64::new(self.total_written()),
            queue_full_events: AtomicU64::new(self.queue_full_events()),
            sink_errors: AtomicU64::new(self.sink_errors()),
        }
    }
}
