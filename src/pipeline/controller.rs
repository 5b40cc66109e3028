//! Playback pipeline controller
//!
//! Owns the delay buffer lifecycle and wires the stage tasks together:
//! frame input → DelayStage → delayed output. The controller is an
//! explicitly owned object; constructing one creates the pipeline state,
//! `stop()` discards all buffered frames, and `shutdown()` tears the tasks
//! down.

use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::assets::SURFACE_RETRY_INTERVAL_MS;
use crate::display::{SurfaceBinding, SurfaceProvider};

use super::PipelineStage;
use super::clock::CaptureClock;
use super::delay_buffer::{DelayBuffer, DelayConfig};
use super::delay_stage::DelayStage;
use super::health::PipelineHealth;
use super::state::PipelineState;
use super::types::{PipelineSignal, VideoFrame};

/// Coordinates the delay pipeline: frame source → DelayStage → render sink
///
/// All control entry points (`play`, `pause`, `stop`, `set_delay`,
/// `bind_surface`) are safe to call from the host thread while the stage
/// tasks run; the delay buffer sits behind a single mutex shared with the
/// stage, so a reconfiguration can never observe a half-finished eviction
/// pass.
pub struct PipelineController {
    buffer: Arc<Mutex<DelayBuffer>>,
    state: Arc<AtomicU8>,
    health: Arc<PipelineHealth>,
    clock: CaptureClock,
    surface: Arc<Mutex<SurfaceBinding>>,

    /// Cancels every task this controller spawned
    cancel: CancellationToken,
    /// Cancels only the surface retry loop; also cancelled by `stop()`
    surface_cancel: CancellationToken,

    signal_tx: mpsc::Sender<PipelineSignal>,
    signal_rx: Option<mpsc::Receiver<PipelineSignal>>,
}

impl PipelineController {
    /// Create a stopped pipeline with the given initial delay
    pub fn new(delay_secs: i64) -> Result<Self> {
        let config = DelayConfig::for_delay(delay_secs)?;
        let (signal_tx, signal_rx) = mpsc::channel::<PipelineSignal>(32);
        let cancel = CancellationToken::new();

        Ok(Self {
            buffer: Arc::new(Mutex::new(DelayBuffer::new(config))),
            state: Arc::new(AtomicU8::new(PipelineState::Stopped as u8)),
            health: Arc::new(PipelineHealth::new()),
            clock: CaptureClock::new(),
            surface: Arc::new(Mutex::new(SurfaceBinding::AwaitingSurface)),
            surface_cancel: cancel.child_token(),
            cancel,
            signal_tx,
            signal_rx: Some(signal_rx),
        })
    }

    /// Get the pipeline clock frames should be stamped with
    pub fn clock(&self) -> &CaptureClock {
        &self.clock
    }

    /// Get the pipeline health metrics
    pub fn health(&self) -> &Arc<PipelineHealth> {
        &self.health
    }

    /// Get the signal sender for capture-side collaborators
    pub fn signal_sender(&self) -> mpsc::Sender<PipelineSignal> {
        self.signal_tx.clone()
    }

    /// Get the current pipeline state
    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Get the current surface binding
    pub fn surface_binding(&self) -> SurfaceBinding {
        *self.surface.lock().unwrap()
    }

    /// Launch the pipeline tasks
    ///
    /// Wires `frames_rx → DelayStage → returned receiver` and spawns the
    /// stage, the signal handler, and the periodic health log. The pipeline
    /// starts in `Stopped`; call `play()` to open the dataflow.
    pub fn launch_pipeline(
        &mut self,
        frames_rx: mpsc::Receiver<VideoFrame>,
    ) -> Result<mpsc::Receiver<VideoFrame>> {
        let signal_rx = self
            .signal_rx
            .take()
            .ok_or_else(|| anyhow!("Pipeline already launched"))?;

        let mut stage = DelayStage::new(
            self.buffer.clone(),
            self.state.clone(),
            self.health.clone(),
            self.signal_tx.clone(),
            self.cancel.clone(),
        );
        stage.set_input(frames_rx);
        let delayed_rx = stage.take_output();

        tokio::spawn(async move {
            if let Err(e) = stage.run().await {
                error!("{} error: {}", stage.name(), e);
            }
        });

        // Signal handler: the only place pipeline signals are interpreted
        let state = self.state.clone();
        let buffer = self.buffer.clone();
        let surface = self.surface.clone();
        let surface_cancel = self.surface_cancel.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut signal_rx = signal_rx;
            loop {
                tokio::select! {
                    signal = signal_rx.recv() => {
                        let Some(signal) = signal else { break };
                        Self::handle_signal(signal, &state, &buffer, &surface, &surface_cancel);
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        });

        // Periodic health log
        let health = self.health.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                tokio::select! {
                    _ = interval.tick() => info!("Pipeline health: {}", health.summary()),
                    _ = cancel.cancelled() => break,
                }
            }
        });

        info!("PipelineController: pipeline launched");
        Ok(delayed_rx)
    }

    fn handle_signal(
        signal: PipelineSignal,
        state: &AtomicU8,
        buffer: &Mutex<DelayBuffer>,
        surface: &Mutex<SurfaceBinding>,
        surface_cancel: &CancellationToken,
    ) {
        match signal {
            PipelineSignal::SurfaceRequested => match surface.lock().unwrap().handle() {
                Some(handle) => info!("Surface requested: reporting {}", handle),
                None => debug!("Surface requested before binding; deferred"),
            },
            PipelineSignal::DeviceError(msg) => {
                error!("Capture device failed: {}", msg);
                Self::apply_stop(state, buffer, surface_cancel);
            }
            PipelineSignal::EndOfStream => {
                info!("Frame source ended");
                Self::apply_stop(state, buffer, surface_cancel);
            }
            PipelineSignal::Other(name) => {
                debug!("Ignoring unrecognized pipeline signal: {}", name);
            }
        }
    }

    /// Stop dataflow and discard all buffered frames
    fn apply_stop(state: &AtomicU8, buffer: &Mutex<DelayBuffer>, surface_cancel: &CancellationToken) {
        state.store(PipelineState::Stopped as u8, Ordering::Release);
        buffer.lock().unwrap().flush();
        surface_cancel.cancel();
        info!("Pipeline stopped");
    }

    fn transition(&self, target: PipelineState) -> Result<()> {
        let current = self.state();
        if !current.can_transition_to(target) {
            return Err(anyhow!("invalid transition: {} -> {}", current, target));
        }
        self.state.store(target as u8, Ordering::Release);
        info!("Pipeline state: {} -> {}", current, target);
        Ok(())
    }

    /// Start or resume playback
    pub fn play(&self) -> Result<()> {
        self.transition(PipelineState::Playing)
    }

    /// Halt dataflow, keeping buffered frames
    pub fn pause(&self) -> Result<()> {
        self.transition(PipelineState::Paused)
    }

    /// Stop playback and discard all buffered frames
    ///
    /// Always succeeds; `Stopped` is reachable from every state. Frames
    /// arriving between `stop()` and the next `play()` are rejected by the
    /// stage.
    pub fn stop(&self) {
        Self::apply_stop(&self.state, &self.buffer, &self.surface_cancel);
    }

    /// Change the playback delay
    ///
    /// Forwards to the buffer's reconfiguration entry point under the
    /// buffer mutex. An out-of-range delay leaves the previous configuration
    /// and the pipeline state untouched; the error is returned to the host.
    pub fn set_delay(&self, delay_secs: i64) -> Result<()> {
        let mut buffer = self.buffer.lock().unwrap();
        match buffer.reconfigure(delay_secs) {
            Ok(()) => {
                info!(
                    "Delay set to {}s ({} frames buffered)",
                    delay_secs,
                    buffer.frame_count()
                );
                Ok(())
            }
            Err(e) => {
                warn!("Rejected delay change: {}", e);
                Err(e)
            }
        }
    }

    /// Attach the render output to the host's surface, deferring until ready
    ///
    /// The provider is polled on a fixed interval; `AwaitingSurface` until a
    /// handle appears, then `Bound`. Polling continues indefinitely until
    /// the surface exists or the pipeline is stopped.
    pub fn bind_surface<P: SurfaceProvider + 'static>(&self, provider: P) {
        let surface = self.surface.clone();
        let cancel = self.surface_cancel.clone();

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(SURFACE_RETRY_INTERVAL_MS));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Some(handle) = provider.poll() {
                            *surface.lock().unwrap() = SurfaceBinding::Bound(handle);
                            info!("Render output bound to {}", handle);
                            break;
                        }
                        debug!("Surface not ready, retrying");
                    }
                    _ = cancel.cancelled() => {
                        info!("Surface binding abandoned");
                        break;
                    }
                }
            }
        });
    }

    /// Tear down every task spawned by this controller
    pub fn shutdown(&self) {
        self.stop();
        self.cancel.cancel();
        info!("PipelineController: shutdown");
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
