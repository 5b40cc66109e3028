// 24fps keeps the capture byte-rate inside the 28-frames-per-second
// capacity budget of the delay buffer at every delay setting.
pub const FRAME_RATE: u32 = 24;
pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 480;

// delay control
pub const MAX_DELAY_SECS: i64 = 10;
pub const DEFAULT_DELAY_SECS: i64 = 3;

// surface binding
pub const SURFACE_RETRY_INTERVAL_MS: u64 = 100;

#[cfg(target_os = "windows")]
pub const TARGET_OS: &str = "windows";
#[cfg(target_os = "macos")]
pub const TARGET_OS: &str = "macos";
#[cfg(target_os = "linux")]
pub const TARGET_OS: &str = "linux";
