//! Bounded delay buffer for the playback pipeline
//!
//! Holds a FIFO window of captured frames long enough to reproduce a
//! user-selected playback delay, while enforcing strict memory, count, and
//! time-span ceilings so the window can never exhaust a small device.
//!
//! # Design
//!
//! The buffer enforces four limits derived together from the requested delay:
//! - **max_span_ns**: elapsed capture time between oldest and newest frame
//! - **max_bytes**: total payload bytes across all queued frames
//! - **max_frames**: number of queued frames
//! - **min_threshold_ns**: minimum buffered span before any frame may leave
//!
//! Admission is leaky, oldest-first: a new frame is always appended, then
//! head frames are evicted until every ceiling holds again. Output is gated
//! on the span check, which is what produces the delay effect: a released
//! frame is always at least `delay_secs` behind the newest captured one.
//!
//! All methods are called under the pipeline's single buffer mutex; the
//! struct itself holds no lock. Reconfiguration swaps the whole config at
//! once, so the eviction loop never runs against half-updated limits.

use anyhow::{Result, anyhow};
use std::collections::VecDeque;

use crate::assets::MAX_DELAY_SECS;

use super::types::VideoFrame;

/// Headroom multiplier applied to the byte and frame budgets.
const CAPACITY_MULT: u64 = 4;

/// Byte budget for one second of footage: seven 640x480 I420 frames.
const BYTES_PER_SEC: u64 = 3_225_600;

/// Frame-count budget for one second of footage.
const FRAMES_PER_SEC: u64 = 7;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Capacity limits derived from a requested delay
///
/// All four values are computed together by [`DelayConfig::for_delay`] and
/// only ever replaced wholesale. `delay_secs = 0` still carries a one-second
/// span ceiling as a safety margin, so the buffer stays bounded even in
/// pass-through mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayConfig {
    /// Requested delay in whole seconds
    pub delay_secs: i64,

    /// Maximum capture-time span between oldest and newest queued frame
    pub max_span_ns: i64,

    /// Maximum total payload bytes
    pub max_bytes: u64,

    /// Maximum number of queued frames
    pub max_frames: usize,

    /// Minimum buffered span before the head frame may be released
    pub min_threshold_ns: i64,
}

impl DelayConfig {
    /// Derive the capacity limits for a delay of `delay_secs` seconds
    ///
    /// Fails with an invalid-parameter error when `delay_secs` is outside
    /// `[0, MAX_DELAY_SECS]`.
    pub fn for_delay(delay_secs: i64) -> Result<Self> {
        if !(0..=MAX_DELAY_SECS).contains(&delay_secs) {
            return Err(anyhow!(
                "delay out of range: {} (expected 0..={})",
                delay_secs,
                MAX_DELAY_SECS
            ));
        }

        let window_secs = delay_secs + 1;
        Ok(Self {
            delay_secs,
            max_span_ns: window_secs * NANOS_PER_SEC,
            max_bytes: CAPACITY_MULT * BYTES_PER_SEC * window_secs as u64,
            max_frames: (CAPACITY_MULT * FRAMES_PER_SEC * window_secs as u64) as usize,
            min_threshold_ns: delay_secs * NANOS_PER_SEC,
        })
    }
}

/// Bounded FIFO of frames producing a fixed playback delay
pub struct DelayBuffer {
    /// Queued frames, oldest first
    frames: VecDeque<VideoFrame>,

    /// Sum of queued payload sizes
    total_bytes: u64,

    /// Active capacity limits
    config: DelayConfig,

    /// Frames evicted under pressure since construction
    evicted_total: u64,
}

impl DelayBuffer {
    /// Create an empty buffer with the given limits
    pub fn new(config: DelayConfig) -> Self {
        Self {
            frames: VecDeque::with_capacity(config.max_frames),
            total_bytes: 0,
            config,
            evicted_total: 0,
        }
    }

    /// Capture-time span between the oldest and newest queued frame
    ///
    /// Zero when one or zero frames are queued, so a single frame can never
    /// satisfy a nonzero release threshold by itself.
    pub fn span_ns(&self) -> i64 {
        match (self.frames.front(), self.frames.back()) {
            (Some(oldest), Some(newest)) => {
                newest.capture_time.saturating_since(oldest.capture_time)
            }
            _ => 0,
        }
    }

    /// Number of queued frames
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Total queued payload bytes
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Active capacity limits
    pub fn config(&self) -> &DelayConfig {
        &self.config
    }

    /// Frames evicted under pressure since construction
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    fn exceeds_limits(&self) -> bool {
        self.span_ns() > self.config.max_span_ns
            || self.total_bytes > self.config.max_bytes
            || self.frames.len() > self.config.max_frames
    }

    fn pop_head(&mut self) -> Option<VideoFrame> {
        let frame = self.frames.pop_front()?;
        self.total_bytes -= frame.size_bytes() as u64;
        Some(frame)
    }

    /// Evict head frames until every ceiling holds. Bounded by the queue
    /// length, so never more than `max_frames + 1` iterations.
    fn evict_to_limits(&mut self) -> usize {
        let mut evicted = 0;
        while self.exceeds_limits() {
            if self.pop_head().is_none() {
                break;
            }
            evicted += 1;
        }
        self.evicted_total += evicted as u64;
        evicted
    }

    /// Append a frame, then restore the capacity invariants
    ///
    /// Returns the number of frames evicted to make room. Oldest frames go
    /// first; a frame that alone exceeds the byte ceiling evicts itself,
    /// leaving the buffer empty but bounded.
    pub fn push(&mut self, frame: VideoFrame) -> usize {
        self.total_bytes += frame.size_bytes() as u64;
        self.frames.push_back(frame);
        self.evict_to_limits()
    }

    /// Release the head frame if enough footage has accumulated
    ///
    /// Returns `None` when the buffer is empty or the buffered span is still
    /// below `min_threshold_ns` — the normal steady state while the buffer
    /// fills after `play()` or a delay increase. Each release shrinks the
    /// span, so repeated calls drain exactly the frames that are at least
    /// `delay_secs` old.
    pub fn try_pop_ready(&mut self) -> Option<VideoFrame> {
        if self.frames.is_empty() {
            return None;
        }
        if self.span_ns() < self.config.min_threshold_ns {
            return None;
        }
        self.pop_head()
    }

    /// Swap in the limits for a new delay and re-enforce them
    ///
    /// On a shrinking delay the tighter ceilings may evict head frames;
    /// a growing delay never recovers already-evicted data and only delays
    /// future releases. On validation failure the previous configuration is
    /// retained unchanged.
    pub fn reconfigure(&mut self, delay_secs: i64) -> Result<()> {
        self.config = DelayConfig::for_delay(delay_secs)?;
        self.evict_to_limits();
        Ok(())
    }

    /// Discard all frames and reset aggregates
    pub fn flush(&mut self) {
        self.frames.clear();
        self.total_bytes = 0;
    }
}

impl std::fmt::Debug for DelayBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayBuffer")
            .field("frames", &self.frames.len())
            .field("total_bytes", &self.total_bytes)
            .field("span_ns", &self.span_ns())
            .field("delay_secs", &self.config.delay_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Timestamp;
    use bytes::Bytes;

    fn make_frame(ts_ns: i64, size: usize) -> VideoFrame {
        VideoFrame::new(
            Bytes::from(vec![0u8; size]),
            Timestamp::from_nanos(ts_ns),
            0,
            320,
            240,
        )
    }

    fn buffer_with_delay(delay_secs: i64) -> DelayBuffer {
        DelayBuffer::new(DelayConfig::for_delay(delay_secs).unwrap())
    }

    #[test]
    fn test_derived_limits_formula() {
        for delay in 0..=10 {
            let config = DelayConfig::for_delay(delay).unwrap();
            assert_eq!(config.max_span_ns, (delay + 1) * 1_000_000_000);
            assert_eq!(config.max_bytes, 4 * 3_225_600 * (delay as u64 + 1));
            assert_eq!(config.max_frames, 28 * (delay as usize + 1));
            assert_eq!(config.min_threshold_ns, delay * 1_000_000_000);
        }
    }

    #[test]
    fn test_derived_limits_delay_three() {
        let config = DelayConfig::for_delay(3).unwrap();
        assert_eq!(config.max_span_ns, 4_000_000_000);
        assert_eq!(config.max_bytes, 38_707_200);
        assert_eq!(config.max_frames, 112);
        assert_eq!(config.min_threshold_ns, 3_000_000_000);
    }

    #[test]
    fn test_delay_out_of_range_rejected() {
        assert!(DelayConfig::for_delay(-1).is_err());
        assert!(DelayConfig::for_delay(11).is_err());
        assert!(DelayConfig::for_delay(0).is_ok());
        assert!(DelayConfig::for_delay(10).is_ok());
    }

    #[test]
    fn test_invariants_hold_after_pushes() {
        let mut buffer = buffer_with_delay(2);

        // 30fps for ten simulated seconds, far beyond every ceiling
        for i in 0..300 {
            buffer.push(make_frame(i * 33_333_333, 460_800));

            let config = *buffer.config();
            assert!(buffer.span_ns() <= config.max_span_ns);
            assert!(buffer.total_bytes() <= config.max_bytes);
            assert!(buffer.frame_count() <= config.max_frames);
        }
    }

    #[test]
    fn test_eviction_is_fifo() {
        let mut buffer = buffer_with_delay(0);
        let max_frames = buffer.config().max_frames;

        // Tiny frames with tiny spacing: only the count ceiling can trip
        for i in 0..max_frames + 1 {
            let evicted = buffer.push(make_frame(i as i64, 1));
            if i < max_frames {
                assert_eq!(evicted, 0);
            } else {
                assert_eq!(evicted, 1);
            }
        }

        assert_eq!(buffer.frame_count(), max_frames);

        // The earliest-pushed frame is gone; survivors keep capture order
        let mut expected_ts = 1i64;
        while let Some(frame) = buffer.try_pop_ready() {
            assert_eq!(frame.capture_time.nanos, expected_ts);
            expected_ts += 1;
        }
        assert_eq!(expected_ts, max_frames as i64 + 1);
    }

    #[test]
    fn test_emission_gated_on_span() {
        let mut buffer = buffer_with_delay(3);

        buffer.push(make_frame(0, 100));
        assert!(buffer.try_pop_ready().is_none());

        buffer.push(make_frame(1_000_000_000, 100));
        assert!(buffer.try_pop_ready().is_none());

        buffer.push(make_frame(2_000_000_000, 100));
        assert!(buffer.try_pop_ready().is_none());

        // Fourth push brings the span to the 3s threshold
        buffer.push(make_frame(3_000_000_000, 100));
        let released = buffer.try_pop_ready().expect("head should be ready");
        assert_eq!(released.capture_time.nanos, 0);

        // Span fell back below the threshold after the release
        assert!(buffer.try_pop_ready().is_none());
    }

    #[test]
    fn test_zero_delay_is_passthrough() {
        let mut buffer = buffer_with_delay(0);
        assert_eq!(buffer.config().min_threshold_ns, 0);

        // A single frame has span 0, which satisfies a zero threshold
        buffer.push(make_frame(0, 100));
        assert!(buffer.try_pop_ready().is_some());

        // The one-second span ceiling still bounds the queue
        buffer.push(make_frame(10_000_000_000, 100));
        buffer.push(make_frame(11_500_000_000, 100));
        assert!(buffer.span_ns() <= buffer.config().max_span_ns);
        assert_eq!(buffer.frame_count(), 1);
    }

    #[test]
    fn test_single_frame_cannot_satisfy_nonzero_threshold() {
        let mut buffer = buffer_with_delay(1);

        buffer.push(make_frame(5_000_000_000, 100));
        assert_eq!(buffer.span_ns(), 0);
        assert!(buffer.try_pop_ready().is_none());
    }

    #[test]
    fn test_byte_ceiling_evicts_oldest() {
        let mut buffer = buffer_with_delay(0);
        let max_bytes = buffer.config().max_bytes as usize;

        buffer.push(make_frame(0, max_bytes / 2));
        buffer.push(make_frame(1, max_bytes / 2));
        assert_eq!(buffer.frame_count(), 2);

        // One more byte than fits: the oldest frame pays
        let evicted = buffer.push(make_frame(2, 1));
        assert_eq!(evicted, 1);
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(
            buffer.try_pop_ready().unwrap().capture_time.nanos,
            1,
            "oldest frame should have been evicted"
        );
    }

    #[test]
    fn test_oversized_frame_evicts_itself() {
        let mut buffer = buffer_with_delay(0);
        let max_bytes = buffer.config().max_bytes as usize;

        let evicted = buffer.push(make_frame(0, max_bytes + 1));
        assert_eq!(evicted, 1);
        assert_eq!(buffer.frame_count(), 0);
        assert_eq!(buffer.total_bytes(), 0);
    }

    #[test]
    fn test_reconfigure_invalid_keeps_state() {
        let mut buffer = buffer_with_delay(3);
        buffer.push(make_frame(0, 100));
        buffer.push(make_frame(1_000_000_000, 100));

        let before = *buffer.config();

        assert!(buffer.reconfigure(-1).is_err());
        assert!(buffer.reconfigure(11).is_err());

        assert_eq!(*buffer.config(), before);
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.total_bytes(), 200);
    }

    #[test]
    fn test_reconfigure_same_delay_is_noop() {
        let mut buffer = buffer_with_delay(3);
        for i in 0..4 {
            buffer.push(make_frame(i * 1_000_000_000, 100));
        }
        let before_evictions = buffer.evicted_total();

        buffer.reconfigure(3).unwrap();

        assert_eq!(buffer.evicted_total(), before_evictions);
        assert_eq!(buffer.frame_count(), 4);
    }

    #[test]
    fn test_reconfigure_shrink_evicts_to_new_limits() {
        let mut buffer = buffer_with_delay(5);
        for i in 0..5 {
            buffer.push(make_frame(i * 1_000_000_000, 100));
        }
        assert_eq!(buffer.span_ns(), 4_000_000_000);

        // 1s delay allows a 2s span: the two oldest frames must go
        buffer.reconfigure(1).unwrap();
        assert_eq!(buffer.frame_count(), 3);
        assert!(buffer.span_ns() <= buffer.config().max_span_ns);
        assert_eq!(buffer.evicted_total(), 2);

        // The survivors emit in order once the threshold is met
        let released = buffer.try_pop_ready().expect("span covers 1s threshold");
        assert_eq!(released.capture_time.nanos, 2_000_000_000);
    }

    #[test]
    fn test_reconfigure_grow_does_not_resurrect() {
        let mut buffer = buffer_with_delay(0);
        buffer.push(make_frame(0, 100));
        buffer.push(make_frame(2_000_000_000, 100));
        // 1s span ceiling already evicted the first frame
        assert_eq!(buffer.frame_count(), 1);

        buffer.reconfigure(5).unwrap();
        assert_eq!(buffer.frame_count(), 1, "growing must not recover frames");
        // Under-filled for the new threshold: emission pauses while refilling
        assert!(buffer.try_pop_ready().is_none());
    }

    #[test]
    fn test_flush_resets_aggregates() {
        let mut buffer = buffer_with_delay(3);
        for i in 0..10 {
            buffer.push(make_frame(i * 100_000_000, 1_000));
        }

        buffer.flush();

        assert_eq!(buffer.frame_count(), 0);
        assert_eq!(buffer.total_bytes(), 0);
        assert_eq!(buffer.span_ns(), 0);
        assert!(buffer.try_pop_ready().is_none());
    }
}
