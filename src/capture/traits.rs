//! Traits for frame-source implementations

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::pipeline::types::VideoFrame;

/// Options a running source re-reads on every frame via `watch`
#[derive(Debug, Clone)]
pub struct CaptureOpts {
    /// Halt frame production without tearing the device down
    pub paused: bool,

    /// Upper bound on the production rate
    pub max_fps: u32,
}

/// Trait for frame-source implementations
///
/// A source owns the capture device; rate and format negotiation happen
/// behind this boundary. Frames arrive on the output channel already
/// stamped with a capture timestamp and sequence number.
#[async_trait]
pub trait FrameSource {
    /// Start producing frames into `output` until stopped
    async fn start_capture(
        &mut self,
        output: mpsc::Sender<VideoFrame>,
        opts_rx: watch::Receiver<CaptureOpts>,
    ) -> Result<()>;

    /// Stop producing frames and release the device
    async fn stop_capture(&mut self) -> Result<()>;

    /// Get the negotiated resolution in (width, height)
    fn resolution(&self) -> (u32, u32);
}
