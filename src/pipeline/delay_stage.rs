//! Delay stage for the playback pipeline
//!
//! Pumps captured frames into the delay buffer and drains ready frames to
//! the render side. Admission happens as frames arrive; release is polled on
//! a short tick, since readiness also changes with the passage of capture
//! time alone.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::info;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::PipelineStage;
use super::delay_buffer::DelayBuffer;
use super::health::PipelineHealth;
use super::state::PipelineState;
use super::types::{PipelineSignal, VideoFrame};

/// How often the stage re-checks the buffer for releasable frames
const POP_TICK: Duration = Duration::from_millis(5);

/// Delay stage
///
/// Owns the pump loop between the frame source and the render sink. The
/// delay buffer itself is shared behind one mutex with the controller, which
/// reconfigures and flushes it; every buffer access here holds that same
/// lock, so eviction never interleaves with a reconfiguration.
///
/// Dataflow follows the pipeline state:
/// - `Playing`: incoming frames are admitted, ready frames are released
/// - `Paused`: incoming frames are discarded, buffered frames are retained
///   and not released (the display freezes on the last drawn frame)
/// - `Stopped`: incoming frames are rejected until the next `play()`
pub struct DelayStage {
    /// Shared delay buffer, locked per operation
    buffer: Arc<Mutex<DelayBuffer>>,
    /// Pipeline state shared with the controller
    state: Arc<AtomicU8>,
    /// Health metrics
    health: Arc<PipelineHealth>,
    /// Input: captured frames
    input_rx: Option<mpsc::Receiver<VideoFrame>>,
    /// Output: delayed frames for the render sink
    output_tx: Option<mpsc::Sender<VideoFrame>>,
    /// Out-of-band signals to the controller
    signal_tx: mpsc::Sender<PipelineSignal>,
    /// Shutdown token
    cancel: CancellationToken,
    /// Statistics
    frames_discarded: u64,
}

impl DelayStage {
    /// Create a new delay stage over a shared buffer
    pub fn new(
        buffer: Arc<Mutex<DelayBuffer>>,
        state: Arc<AtomicU8>,
        health: Arc<PipelineHealth>,
        signal_tx: mpsc::Sender<PipelineSignal>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            buffer,
            state,
            health,
            input_rx: None,
            output_tx: None,
            signal_tx,
            cancel,
            frames_discarded: 0,
        }
    }

    /// Set the frame input channel
    pub fn set_input(&mut self, rx: mpsc::Receiver<VideoFrame>) {
        self.input_rx = Some(rx);
    }

    /// Get the delayed-frame output channel
    pub fn take_output(&mut self) -> mpsc::Receiver<VideoFrame> {
        let (tx, rx) = mpsc::channel::<VideoFrame>(8);
        self.output_tx = Some(tx);
        rx
    }

    fn pipeline_state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Admit one frame according to the current pipeline state
    ///
    /// Returns true if the frame entered the buffer.
    fn admit(&mut self, frame: VideoFrame) -> bool {
        match self.pipeline_state() {
            PipelineState::Playing => {
                let size = frame.size_bytes();
                let evicted = self.buffer.lock().unwrap().push(frame);
                self.health.record_admitted(size);
                if evicted > 0 {
                    self.health.record_evicted(evicted);
                }
                true
            }
            PipelineState::Paused | PipelineState::Stopped => {
                self.frames_discarded += 1;
                false
            }
        }
    }

    /// Collect every frame whose buffered span has reached the threshold
    ///
    /// Each release shrinks the span, so the loop stops on its own once the
    /// head frame is younger than the configured delay.
    fn drain_ready(&mut self) -> Vec<VideoFrame> {
        if !self.pipeline_state().is_playing() {
            return Vec::new();
        }

        let mut released = Vec::new();
        let mut buffer = self.buffer.lock().unwrap();
        while let Some(frame) = buffer.try_pop_ready() {
            self.health.record_released();
            released.push(frame);
        }
        released
    }
}

#[async_trait]
impl PipelineStage for DelayStage {
    async fn run(&mut self) -> Result<()> {
        let mut input = self
            .input_rx
            .take()
            .ok_or_else(|| anyhow!("No frame input channel"))?;
        let output = self
            .output_tx
            .take()
            .ok_or_else(|| anyhow!("No frame output channel"))?;

        info!(
            "DelayStage: started (delay: {}s)",
            self.buffer.lock().unwrap().config().delay_secs
        );

        let cancel = self.cancel.clone();
        let mut tick = tokio::time::interval(POP_TICK);
        let mut last_stats_log = Instant::now();

        loop {
            tokio::select! {
                frame = input.recv() => {
                    match frame {
                        Some(frame) => {
                            self.admit(frame);
                            for released in self.drain_ready() {
                                if output.send(released).await.is_err() {
                                    info!("DelayStage: output channel closed");
                                    return Ok(());
                                }
                            }
                        }
                        None => {
                            info!("DelayStage: frame input closed");
                            let _ = self.signal_tx.send(PipelineSignal::EndOfStream).await;
                            break;
                        }
                    }
                }
                _ = tick.tick() => {
                    for released in self.drain_ready() {
                        if output.send(released).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("DelayStage: shutdown requested");
                    break;
                }
            }

            if last_stats_log.elapsed().as_secs() >= 30 {
                let (count, bytes, span) = {
                    let buffer = self.buffer.lock().unwrap();
                    (buffer.frame_count(), buffer.total_bytes(), buffer.span_ns())
                };
                info!(
                    "DelayStage: buffered {} frames / {} bytes, span {}ms, {} discarded",
                    count,
                    bytes,
                    span / 1_000_000,
                    self.frames_discarded,
                );
                last_stats_log = Instant::now();
            }
        }

        info!(
            "DelayStage: finished ({} released, {} discarded)",
            self.health.frames_released(),
            self.frames_discarded
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "DelayStage"
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.cancel.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::delay_buffer::DelayConfig;
    use crate::pipeline::types::Timestamp;
    use bytes::Bytes;

    fn make_frame(ts_ns: i64) -> VideoFrame {
        VideoFrame::new(
            Bytes::from(vec![0u8; 256]),
            Timestamp::from_nanos(ts_ns),
            0,
            320,
            240,
        )
    }

    fn make_stage(delay_secs: i64, state: PipelineState) -> DelayStage {
        let buffer = Arc::new(Mutex::new(DelayBuffer::new(
            DelayConfig::for_delay(delay_secs).unwrap(),
        )));
        let (signal_tx, _signal_rx) = mpsc::channel(8);
        DelayStage::new(
            buffer,
            Arc::new(AtomicU8::new(state as u8)),
            Arc::new(PipelineHealth::new()),
            signal_tx,
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_admit_and_drain_respect_gating() {
        let mut stage = make_stage(3, PipelineState::Playing);

        for ts in [0, 1_000_000_000, 2_000_000_000] {
            assert!(stage.admit(make_frame(ts)));
            assert!(stage.drain_ready().is_empty());
        }

        assert!(stage.admit(make_frame(3_000_000_000)));
        let released = stage.drain_ready();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].capture_time.nanos, 0);
    }

    #[test]
    fn test_paused_discards_incoming() {
        let mut stage = make_stage(1, PipelineState::Playing);
        assert!(stage.admit(make_frame(0)));

        stage
            .state
            .store(PipelineState::Paused as u8, Ordering::Release);

        assert!(!stage.admit(make_frame(1_000_000_000)));
        assert_eq!(stage.buffer.lock().unwrap().frame_count(), 1);
        assert!(stage.drain_ready().is_empty(), "no release while paused");
    }

    #[test]
    fn test_stopped_rejects_incoming() {
        let mut stage = make_stage(0, PipelineState::Stopped);

        assert!(!stage.admit(make_frame(0)));
        assert_eq!(stage.buffer.lock().unwrap().frame_count(), 0);
        assert_eq!(stage.frames_discarded, 1);
    }

    #[test]
    fn test_health_tracks_evictions() {
        let mut stage = make_stage(0, PipelineState::Playing);
        let max_frames = stage.buffer.lock().unwrap().config().max_frames;

        for i in 0..max_frames + 1 {
            stage.admit(make_frame(i as i64));
        }

        assert_eq!(stage.health.frames_admitted(), max_frames as u64 + 1);
        assert_eq!(stage.health.frames_evicted(), 1);
    }

    #[tokio::test]
    async fn test_run_pumps_frames_end_to_end() {
        let mut stage = make_stage(0, PipelineState::Playing);
        let cancel = stage.cancel.clone();

        let (input_tx, input_rx) = mpsc::channel(16);
        stage.set_input(input_rx);
        let mut output_rx = stage.take_output();

        let handle = tokio::spawn(async move { stage.run().await });

        // Zero delay is pass-through: each frame comes straight out
        for ts in [0, 33_000_000, 66_000_000] {
            input_tx.send(make_frame(ts)).await.unwrap();
            let released = output_rx.recv().await.expect("frame should pass through");
            assert_eq!(released.capture_time.nanos, ts);
        }

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
