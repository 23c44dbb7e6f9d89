//! Periodic screenshot capture.
//!
//! Shoots the active monitor as tracked by the last mouse position; once
//! the user has been idle past the timeout, every monitor is captured so
//! nothing happening off the "active" screen is lost.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use ido_model::{MonitorInfo, RawRecord, ScreenshotRecord};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;

use super::tracker::ActiveMonitorTracker;
use super::RecordSink;

/// Platform capture backend: monitor enumeration plus per-monitor frames.
pub trait ScreenCaptureBackend: Send + Sync {
    fn monitors(&self) -> Result<Vec<MonitorInfo>>;

    /// JPEG/PNG-encoded frame for a 1-based monitor index.
    fn capture_monitor(&self, index: usize) -> Result<Vec<u8>>;
}

pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Periodic capture task. Owns no driver thread; everything happens on the
/// scheduler with the blocking capture dispatched to a worker.
pub struct ScreenshotCapturer {
    backend: Arc<dyn ScreenCaptureBackend>,
    tracker: Arc<ActiveMonitorTracker>,
    sink: RecordSink,
    interval: Duration,
    paused: Arc<AtomicBool>,
}

impl std::fmt::Debug for ScreenshotCapturer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenshotCapturer")
            .field("interval", &self.interval)
            .field("paused", &self.paused.load(Ordering::Relaxed))
            .finish()
    }
}

impl ScreenshotCapturer {
    pub fn new(
        backend: Arc<dyn ScreenCaptureBackend>,
        tracker: Arc<ActiveMonitorTracker>,
        sink: RecordSink,
        interval: Duration,
        paused: Arc<AtomicBool>,
    ) -> Self {
        Self {
            backend,
            tracker,
            sink,
            interval: interval.max(Duration::from_millis(100)),
            paused,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            // Seed the tracker before the first shot.
            match self.backend.monitors() {
                Ok(monitors) => self.tracker.update_monitors(monitors),
                Err(e) => warn!("monitor enumeration failed: {e}"),
            }

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("screenshot capturer cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(self.interval) => {
                        if self.paused.load(Ordering::SeqCst) {
                            continue;
                        }
                        if let Err(e) = self.tick().await {
                            warn!("screenshot tick failed: {e}");
                        }
                    }
                }
            }
        })
    }

    async fn tick(&self) -> Result<()> {
        let indexes: Vec<usize> = if self.tracker.should_capture_all() {
            self.tracker.monitors().iter().map(|m| m.index).collect()
        } else {
            vec![self.tracker.get_active_index()]
        };

        for index in indexes {
            let backend = Arc::clone(&self.backend);
            let captured = tokio::task::spawn_blocking(move || {
                backend.capture_monitor(index)
            })
            .await
            .map_err(|e| {
                crate::error::IdoError::Internal(format!(
                    "capture worker died: {e}"
                ))
            })?;

            match captured {
                Ok(bytes) => {
                    let record = RawRecord::Screenshot(ScreenshotRecord {
                        timestamp: Utc::now(),
                        hash: content_hash(&bytes),
                        bytes: Some(bytes),
                        optimized_base64: None,
                        monitor_index: Some(index),
                        path: None,
                        sequence: None,
                    });
                    (self.sink)(record);
                }
                Err(e) => warn!(monitor = index, "capture failed: {e}"),
            }
        }

        Ok(())
    }
}
