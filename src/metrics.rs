use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Buffer-level counters.
///
/// Uses atomic counters with `Relaxed` ordering since these are purely
/// statistical - no control flow depends on exact values, and eventual
/// visibility is acceptable for observability. `stale_rollbacks` is the
/// one counter tests rely on: it observes the consumer's rollback path.
#[derive(Debug)]
pub struct Metrics {
    rows_written: AtomicU64,
    rows_read: AtomicU64,
    stale_rollbacks: AtomicU64,
    claim_retries: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            rows_written: AtomicU64::new(0),
            rows_read: AtomicU64::new(0),
            stale_rollbacks: AtomicU64::new(0),
            claim_retries: AtomicU64::new(0),
        }
    }

    /// Increment rows released by producers.
    #[inline]
    pub fn add_rows_written(&self, n: u64) {
        self.rows_written.fetch_add(n, Ordering::Relaxed);
    }

    /// Increment rows released by consumers.
    #[inline]
    pub fn add_rows_read(&self, n: u64) {
        self.rows_read.fetch_add(n, Ordering::Relaxed);
    }

    /// Increment stale consumer claims that were rolled back.
    #[inline]
    pub fn add_stale_rollbacks(&self, n: u64) {
        self.stale_rollbacks.fetch_add(n, Ordering::Relaxed);
    }

    /// Increment failed claim CAS attempts.
    #[inline]
    pub fn add_claim_retries(&self, n: u64) {
        self.claim_retries.fetch_add(n, Ordering::Relaxed);
    }

    /// Take a snapshot of current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rows_written: self.rows_written.load(Ordering::Relaxed),
            rows_read: self.rows_read.load(Ordering::Relaxed),
            stale_rollbacks: self.stale_rollbacks.load(Ordering::Relaxed),
            claim_retries: self.claim_retries.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters; part of returning the buffer to its initial state.
    pub fn reset(&self) {
        self.rows_written.store(0, Ordering::Relaxed);
        self.rows_read.store(0, Ordering::Relaxed);
        self.stale_rollbacks.store(0, Ordering::Relaxed);
        self.claim_retries.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rows_written: u64,
    pub rows_read: u64,
    pub stale_rollbacks: u64,
    pub claim_retries: u64,
}

/// Wall-clock interval measurement over the monotonic clock.
///
/// Started when constructed; `elapsed()` can be read on any exit path.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
