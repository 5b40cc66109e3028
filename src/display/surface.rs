//! Drawing-surface model
//!
//! The host owns the actual window; the pipeline only ever sees an opaque
//! handle. A surface may not exist yet when the pipeline starts, so
//! availability is modeled as a provider the controller polls on a fixed
//! interval until a handle appears.

use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque handle to the host's drawing surface (window id, texture id, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceHandle(pub u64);

impl std::fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Controller-side state of the surface binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceBinding {
    /// No handle yet; the provider is being polled
    AwaitingSurface,

    /// The render output is attached to this handle
    Bound(SurfaceHandle),
}

impl SurfaceBinding {
    pub fn is_bound(&self) -> bool {
        matches!(self, SurfaceBinding::Bound(_))
    }

    pub fn handle(&self) -> Option<SurfaceHandle> {
        match self {
            SurfaceBinding::Bound(handle) => Some(*handle),
            SurfaceBinding::AwaitingSurface => None,
        }
    }
}

/// Source of the host's surface handle
///
/// `poll` is called repeatedly until it yields a handle; returning `None`
/// means "not ready yet", which is a transient condition, not an error.
pub trait SurfaceProvider: Send + Sync {
    fn poll(&self) -> Option<SurfaceHandle>;
}

/// Provider for a surface that already exists
pub struct FixedSurface {
    handle: SurfaceHandle,
}

impl FixedSurface {
    pub fn new(id: u64) -> Self {
        Self {
            handle: SurfaceHandle(id),
        }
    }
}

impl SurfaceProvider for FixedSurface {
    fn poll(&self) -> Option<SurfaceHandle> {
        Some(self.handle)
    }
}

/// Provider that becomes ready after a number of polls
///
/// Stands in for a host whose window is created asynchronously.
pub struct DeferredSurface {
    handle: SurfaceHandle,
    remaining: AtomicU64,
}

impl DeferredSurface {
    pub fn new(id: u64, polls_until_ready: u64) -> Self {
        Self {
            handle: SurfaceHandle(id),
            remaining: AtomicU64::new(polls_until_ready),
        }
    }
}

impl SurfaceProvider for DeferredSurface {
    fn poll(&self) -> Option<SurfaceHandle> {
        let remaining = self.remaining.load(Ordering::Acquire);
        if remaining == 0 {
            return Some(self.handle);
        }
        self.remaining.store(remaining - 1, Ordering::Release);
        None
    }
}
