use crate::assets::{DEFAULT_DELAY_SECS, FRAME_HEIGHT, FRAME_RATE, FRAME_WIDTH};

/// Runtime configuration for one pipeline run
pub struct Config {
    /// Initial playback delay in seconds
    pub delay_secs: i64,

    /// Capture rate cap
    pub fps: u32,

    /// Capture width in pixels
    pub width: u32,

    /// Capture height in pixels
    pub height: u32,

    /// Stop after this many seconds; run until interrupted when absent
    pub duration_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Config {
            delay_secs: DEFAULT_DELAY_SECS,
            fps: FRAME_RATE,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            duration_secs: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
