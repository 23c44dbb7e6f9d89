//! Platform-abstracted perception drivers.
//!
//! Each driver observes one input domain (keyboard, mouse, active window,
//! screen lock) and reports through a single [`RecordSink`] callback. A
//! factory picks implementations from OS identity; hosts without the
//! `capture` feature get inert drivers so the rest of the daemon still
//! runs.

pub mod factory;
#[cfg(feature = "capture")]
pub mod platform;
pub mod screenshot;
pub mod tracker;
pub mod window;

use std::sync::Arc;

use ido_model::RawRecord;

use crate::error::Result;

pub use factory::{DriverSet, PerceptionFactory};
pub use screenshot::{ScreenCaptureBackend, ScreenshotCapturer};
pub use tracker::ActiveMonitorTracker;
pub use window::{ActiveWindowProvider, enrich_with_monitor};

/// Callback through which every driver reports observations.
pub type RecordSink = Arc<dyn Fn(RawRecord) + Send + Sync>;

/// Callback invoked on screen lock/unlock transitions.
pub type LockSink = Arc<dyn Fn(bool) + Send + Sync>;

/// One perception driver. `start` must not block; implementations own any
/// background thread they need. A failing driver degrades the coordinator
/// but never tears down its siblings.
pub trait PerceptionDriver: Send {
    fn name(&self) -> &'static str;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self);
}
