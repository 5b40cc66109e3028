//! Render-side collaborators
//!
//! The pipeline releases delayed frames; everything here is the thin far
//! end of that hand-off: the surface-binding model the controller polls,
//! the sink that draws released frames, and the pass-through transforms
//! applied just before drawing.

pub mod sink;
pub mod surface;
pub mod transform;

pub use sink::{LogSink, RenderSink};
pub use surface::{DeferredSurface, FixedSurface, SurfaceBinding, SurfaceHandle, SurfaceProvider};
pub use transform::{FrameTransform, MirrorFlip};
