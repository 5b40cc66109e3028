//! Render sinks consuming delayed frames

use log::{debug, info};

use crate::pipeline::types::VideoFrame;

use super::surface::SurfaceHandle;

/// Consumer of frames released by the delay buffer
///
/// Takes ownership of each frame; the buffer is done with it.
pub trait RenderSink: Send {
    /// Attach the sink to the host's drawing surface
    fn attach(&mut self, handle: SurfaceHandle);

    /// Draw one frame
    fn draw(&mut self, frame: VideoFrame);

    /// Number of frames drawn so far
    fn frames_drawn(&self) -> u64;
}

/// Headless sink that records what it would have drawn
///
/// Used by the binary driver and by tests; a windowed host supplies its own
/// `RenderSink` drawing to a real surface.
pub struct LogSink {
    surface: Option<SurfaceHandle>,
    frames_drawn: u64,
    last_seq: Option<u64>,
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            surface: None,
            frames_drawn: 0,
            last_seq: None,
        }
    }

    /// Sequence number of the most recently drawn frame
    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for LogSink {
    fn attach(&mut self, handle: SurfaceHandle) {
        info!("LogSink: attached to {}", handle);
        self.surface = Some(handle);
    }

    fn draw(&mut self, frame: VideoFrame) {
        self.frames_drawn += 1;
        self.last_seq = Some(frame.seq);

        debug!(
            "LogSink: frame seq {} ({} bytes, captured at {})",
            frame.seq,
            frame.size_bytes(),
            frame.capture_time
        );
        if self.frames_drawn % 240 == 0 {
            info!("LogSink: {} frames drawn", self.frames_drawn);
        }
    }

    fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Timestamp;
    use bytes::Bytes;

    fn make_frame(seq: u64) -> VideoFrame {
        VideoFrame::new(Bytes::from(vec![0u8; 64]), Timestamp::from_nanos(0), seq, 8, 8)
    }

    #[test]
    fn test_log_sink_counts_frames() {
        let mut sink = LogSink::new();
        sink.attach(SurfaceHandle(1));

        sink.draw(make_frame(0));
        sink.draw(make_frame(1));
        sink.draw(make_frame(2));

        assert_eq!(sink.frames_drawn(), 3);
        assert_eq!(sink.last_seq(), Some(2));
    }
}
