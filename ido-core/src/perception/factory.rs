//! OS-identity driver factory.
//!
//! Callers only know the driver contracts; the factory picks whichever
//! implementation the platform (and build features) can provide. Missing
//! backends degrade to an inert driver set so the daemon still records
//! whatever the remaining drivers produce.

use std::sync::Arc;

#[cfg(feature = "capture")]
use tracing::debug;
#[cfg(not(feature = "capture"))]
use tracing::warn;

use super::screenshot::ScreenCaptureBackend;
use super::tracker::ActiveMonitorTracker;
use super::window::ActiveWindowProvider;
use super::{LockSink, PerceptionDriver, RecordSink};

/// Everything the coordinator needs from the perception layer.
pub struct DriverSet {
    pub drivers: Vec<Box<dyn PerceptionDriver>>,
    pub capture_backend: Option<Arc<dyn ScreenCaptureBackend>>,
    pub window_provider: Option<Arc<dyn ActiveWindowProvider>>,
}

impl std::fmt::Debug for DriverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverSet")
            .field(
                "drivers",
                &self
                    .drivers
                    .iter()
                    .map(|d| d.name())
                    .collect::<Vec<_>>(),
            )
            .field("capture_backend", &self.capture_backend.is_some())
            .field("window_provider", &self.window_provider.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct PerceptionFactory;

impl PerceptionFactory {
    pub fn platform() -> &'static str {
        std::env::consts::OS
    }

    /// Builds the driver set for the current platform.
    #[cfg(feature = "capture")]
    pub fn create(
        sink: RecordSink,
        lock_sink: LockSink,
        tracker: Arc<ActiveMonitorTracker>,
    ) -> DriverSet {
        use super::platform;

        debug!(platform = Self::platform(), "creating capture drivers");

        let mut drivers: Vec<Box<dyn PerceptionDriver>> = Vec::new();
        drivers.push(Box::new(platform::InputHookDriver::new(
            sink,
            Arc::clone(&tracker),
        )));
        drivers.push(Box::new(platform::ScreenLockDriver::new(lock_sink)));

        DriverSet {
            drivers,
            capture_backend: Some(Arc::new(platform::XcapBackend::new())),
            window_provider: Some(Arc::new(platform::XcapWindowProvider::new(
                tracker,
            ))),
        }
    }

    /// Headless build: no OS hooks are linked in. The pipeline and agents
    /// still run; an embedding host may feed records through the sink it
    /// owns.
    #[cfg(not(feature = "capture"))]
    pub fn create(
        _sink: RecordSink,
        _lock_sink: LockSink,
        _tracker: Arc<ActiveMonitorTracker>,
    ) -> DriverSet {
        warn!(
            platform = Self::platform(),
            "built without the `capture` feature; perception drivers are inert"
        );
        DriverSet {
            drivers: Vec::new(),
            capture_backend: None,
            window_provider: None,
        }
    }
}
