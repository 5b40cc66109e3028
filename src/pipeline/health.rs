//! Health metrics for the playback pipeline

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Health metrics for the delay pipeline
///
/// Tracks admission, release, and eviction counters so the controller can
/// log a periodic summary and detect a stalled source. All fields use atomic
/// operations for thread-safe access.
pub struct PipelineHealth {
    /// Frames accepted into the delay buffer
    pub frames_admitted: AtomicU64,

    /// Frames released to the render sink
    pub frames_released: AtomicU64,

    /// Frames evicted by the capacity ceilings
    pub frames_evicted: AtomicU64,

    /// Total payload bytes admitted
    pub bytes_admitted: AtomicU64,

    /// Timestamp (Unix microseconds) of the last admitted frame
    pub last_frame_time: AtomicU64,
}

impl PipelineHealth {
    /// Create a new health metrics instance
    pub fn new() -> Self {
        Self {
            frames_admitted: AtomicU64::new(0),
            frames_released: AtomicU64::new(0),
            frames_evicted: AtomicU64::new(0),
            bytes_admitted: AtomicU64::new(0),
            last_frame_time: AtomicU64::new(now_micros()),
        }
    }

    /// Record an admitted frame
    pub fn record_admitted(&self, size: usize) {
        self.last_frame_time.store(now_micros(), Ordering::Relaxed);
        self.frames_admitted.fetch_add(1, Ordering::Relaxed);
        self.bytes_admitted
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Record a frame released to the sink
    pub fn record_released(&self) {
        self.frames_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Record frames evicted under capacity pressure
    pub fn record_evicted(&self, count: usize) {
        self.frames_evicted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Get the number of admitted frames
    pub fn frames_admitted(&self) -> u64 {
        self.frames_admitted.load(Ordering::Relaxed)
    }

    /// Get the number of released frames
    pub fn frames_released(&self) -> u64 {
        self.frames_released.load(Ordering::Relaxed)
    }

    /// Get the number of evicted frames
    pub fn frames_evicted(&self) -> u64 {
        self.frames_evicted.load(Ordering::Relaxed)
    }

    /// Get the total admitted bytes
    pub fn bytes_admitted(&self) -> u64 {
        self.bytes_admitted.load(Ordering::Relaxed)
    }

    /// Calculate the eviction rate as a percentage of admitted frames
    pub fn eviction_rate(&self) -> f64 {
        let evicted = self.frames_evicted();
        let admitted = self.frames_admitted();
        if admitted == 0 {
            return 0.0;
        }
        (evicted as f64 / admitted as f64) * 100.0
    }

    /// Check if the source has stalled (no frames for given duration)
    pub fn is_stalled(&self, threshold: Duration) -> bool {
        let last_frame = self.last_frame_time.load(Ordering::Relaxed);
        let elapsed_micros = now_micros().saturating_sub(last_frame);
        elapsed_micros > threshold.as_micros() as u64
    }

    /// Get a summary of health metrics
    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            frames_admitted: self.frames_admitted(),
            frames_released: self.frames_released(),
            frames_evicted: self.frames_evicted(),
            bytes_admitted: self.bytes_admitted(),
            eviction_rate: self.eviction_rate(),
        }
    }
}

impl Default for PipelineHealth {
    fn default() -> Self {
        Self::new()
    }
}

fn now_micros() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

/// Snapshot of health metrics
#[derive(Debug, Clone)]
pub struct HealthSummary {
    pub frames_admitted: u64,
    pub frames_released: u64,
    pub frames_evicted: u64,
    pub bytes_admitted: u64,
    pub eviction_rate: f64,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Health: {} admitted, {} released, {} evicted ({:.2}%), {} bytes",
            self.frames_admitted,
            self.frames_released,
            self.frames_evicted,
            self.eviction_rate,
            self.bytes_admitted
        )
    }
}
