//! Monotonic capture clock

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::types::Timestamp;

/// Monotonic time base for frame timestamps
///
/// All capture timestamps are taken relative to a single base `Instant`, so
/// span arithmetic in the delay buffer never sees wall-clock jumps. The
/// clock also hands out capture sequence numbers.
///
/// # Thread Safety
///
/// The clock is thread-safe and cheap to clone via `Arc`; the sequence
/// counter uses atomic operations for lock-free updates.
#[derive(Clone)]
pub struct CaptureClock {
    /// Base instant when the clock started
    base: Arc<Instant>,

    /// Capture sequence counter
    seq_counter: Arc<AtomicU64>,
}

impl CaptureClock {
    /// Create a new capture clock starting now
    pub fn new() -> Self {
        Self {
            base: Arc::new(Instant::now()),
            seq_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a capture clock with a specific base instant
    pub fn with_base(base: Instant) -> Self {
        Self {
            base: Arc::new(base),
            seq_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get the base instant
    pub fn base(&self) -> Instant {
        *self.base
    }

    /// Get the current capture timestamp
    pub fn now(&self) -> Timestamp {
        Timestamp::from_duration(self.base.elapsed())
    }

    /// Get a timestamp relative to the clock base
    pub fn timestamp_from_instant(&self, instant: Instant) -> Timestamp {
        Timestamp::from_instant(instant, *self.base)
    }

    /// Generate the next capture sequence number
    pub fn next_seq(&self) -> u64 {
        self.seq_counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for CaptureClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CaptureClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureClock")
            .field("elapsed", &self.base.elapsed())
            .finish()
    }
}
