//! Pass-through frame transforms applied between buffering and display

use crate::pipeline::types::VideoFrame;

/// A stateless per-frame transform
pub trait FrameTransform: Send + Sync {
    /// Apply the transform, producing a new frame with the same metadata
    fn apply(&self, frame: VideoFrame) -> VideoFrame;

    /// Get the name of this transform for logging
    fn name(&self) -> &'static str;
}

/// Horizontal mirror for packed pixel formats
///
/// Reverses the pixel order within each row. The viewer sees themselves as
/// in a mirror, which is what a delayed self-view is for. Only valid for
/// packed formats where a row is `width * bytes_per_pixel` contiguous bytes.
pub struct MirrorFlip {
    bytes_per_pixel: usize,
}

impl MirrorFlip {
    pub fn new(bytes_per_pixel: usize) -> Self {
        Self { bytes_per_pixel }
    }
}

impl FrameTransform for MirrorFlip {
    fn apply(&self, frame: VideoFrame) -> VideoFrame {
        let stride = frame.width as usize * self.bytes_per_pixel;
        if stride == 0 || frame.data.len() < stride * frame.height as usize {
            // Payload does not cover the advertised geometry; pass through
            return frame;
        }

        let mut mirrored = frame.data.to_vec();
        for row in mirrored.chunks_exact_mut(stride) {
            let pixels = row.len() / self.bytes_per_pixel;
            for left in 0..pixels / 2 {
                let right = pixels - 1 - left;
                for byte in 0..self.bytes_per_pixel {
                    row.swap(
                        left * self.bytes_per_pixel + byte,
                        right * self.bytes_per_pixel + byte,
                    );
                }
            }
        }

        VideoFrame::new(
            mirrored.into(),
            frame.capture_time,
            frame.seq,
            frame.width,
            frame.height,
        )
    }

    fn name(&self) -> &'static str {
        "MirrorFlip"
    }
}
