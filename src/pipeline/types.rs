//! Core types for the pipeline system

use bytes::Bytes;
use std::time::{Duration, Instant};

/// Timestamp representation for captured frames
///
/// Nanoseconds on the capture clock's monotonic time base. Nanosecond
/// resolution matches the delay buffer's span arithmetic, which compares
/// buffered footage against second-granularity thresholds without rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    /// Nanoseconds since pipeline start
    pub nanos: i64,
}

impl Timestamp {
    /// Create a new timestamp from nanoseconds
    pub fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    /// Create a timestamp from whole seconds
    pub fn from_secs(secs: i64) -> Self {
        Self {
            nanos: secs * 1_000_000_000,
        }
    }

    /// Create a timestamp from a duration since the clock base
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            nanos: duration.as_nanos() as i64,
        }
    }

    /// Create a timestamp from an instant relative to a base
    pub fn from_instant(instant: Instant, base: Instant) -> Self {
        let duration = instant.saturating_duration_since(base);
        Self::from_duration(duration)
    }

    /// Convert to a duration
    pub fn as_duration(&self) -> Duration {
        Duration::from_nanos(self.nanos.max(0) as u64)
    }

    /// Elapsed time between two timestamps, saturating at zero
    pub fn saturating_since(&self, earlier: Timestamp) -> i64 {
        (self.nanos - earlier.nanos).max(0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ns", self.nanos)
    }
}

/// A single captured video frame
///
/// The payload is opaque to the delay buffer; only its length and the
/// capture timestamp participate in the capacity model. Created by the
/// frame source, owned by the delay buffer while queued, transferred to
/// the render sink on release.
#[derive(Clone)]
pub struct VideoFrame {
    /// Raw frame data
    pub data: Bytes,

    /// When this frame was captured, on the pipeline's monotonic clock
    pub capture_time: Timestamp,

    /// Capture sequence number, monotonically increasing per run
    pub seq: u64,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,
}

impl VideoFrame {
    pub fn new(data: Bytes, capture_time: Timestamp, seq: u64, width: u32, height: u32) -> Self {
        Self {
            data,
            capture_time,
            seq,
            width,
            height,
        }
    }

    /// Get the size of the frame payload in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("capture_time", &self.capture_time)
            .field("seq", &self.seq)
            .field("size", &self.size_bytes())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Out-of-band pipeline signals
///
/// The known set of conditions the controller reacts to. Matching is
/// exhaustive: every recognized kind has a dedicated handling path and only
/// `Other` is logged-and-ignored.
#[derive(Debug, Clone)]
pub enum PipelineSignal {
    /// The render sink asked for a window/surface handle
    SurfaceRequested,

    /// The capture device failed; fatal to the current run
    DeviceError(String),

    /// The frame source closed its output; no more frames will arrive
    EndOfStream,

    /// Unrecognized signal, carried for logging only
    Other(String),
}

impl std::fmt::Display for PipelineSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineSignal::SurfaceRequested => write!(f, "surface requested"),
            PipelineSignal::DeviceError(msg) => write!(f, "device error: {}", msg),
            PipelineSignal::EndOfStream => write!(f, "end of stream"),
            PipelineSignal::Other(name) => write!(f, "other: {}", name),
        }
    }
}
