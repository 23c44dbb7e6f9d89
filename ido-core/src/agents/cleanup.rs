//! Retention and orphan-image sweeps.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ido_config::CleanupConfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::database::{Database, RetentionCounts};
use crate::error::Result;
use crate::image::ImageManager;

#[derive(Debug, Default, Clone)]
pub struct CleanupStats {
    pub total_cleanups: u64,
    pub last_cleanup_time: Option<DateTime<Utc>>,
    pub last_cleanup_counts: RetentionCounts,
    pub total_orphaned_images_cleaned: u64,
    pub last_orphaned_images_count: u64,
}

/// Periodic retention enforcement: soft/hard-deletes expired rows and
/// removes thumbnail files no action references any more. Errors never
/// escape the task boundary.
pub struct CleanupAgent {
    db: Database,
    image_manager: Option<Arc<ImageManager>>,
    config: CleanupConfig,
    paused: AtomicBool,
    stats: StdMutex<CleanupStats>,
}

impl std::fmt::Debug for CleanupAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupAgent")
            .field("config", &self.config)
            .finish()
    }
}

impl CleanupAgent {
    pub fn new(
        db: Database,
        image_manager: Option<Arc<ImageManager>>,
        config: CleanupConfig,
    ) -> Self {
        Self {
            db,
            image_manager,
            config,
            paused: AtomicBool::new(false),
            stats: StdMutex::new(CleanupStats::default()),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stats(&self) -> CleanupStats {
        self.stats.lock().expect("stats lock").clone()
    }

    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let agent = Arc::clone(self);
        let interval =
            Duration::from_secs(self.config.cleanup_interval.max(1));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("cleanup agent cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if agent.paused.load(Ordering::SeqCst) {
                            debug!("cleanup agent paused, skipping sweep");
                            continue;
                        }
                        if let Err(e) = agent.cleanup_once().await {
                            warn!("cleanup sweep failed: {e}");
                        }
                    }
                }
            }
        })
    }

    /// One retention + orphan sweep.
    pub async fn cleanup_once(&self) -> Result<()> {
        let cutoff =
            Utc::now() - chrono::Duration::days(self.config.retention_days);
        info!(cutoff = %cutoff.date_naive(), "retention sweep starting");

        let counts = self.db.delete_old_data(cutoff).await?;
        {
            let mut stats = self.stats.lock().expect("stats lock");
            stats.total_cleanups += 1;
            stats.last_cleanup_time = Some(Utc::now());
            stats.last_cleanup_counts = counts.clone();
        }
        info!(total = counts.total(), "retention sweep done");

        if let Some(manager) = &self.image_manager {
            // The reference set is snapshotted at sweep start; the safety
            // window keeps any in-flight batch's fresh hashes alive.
            let referenced =
                self.db.actions.get_all_referenced_image_hashes().await?;
            let safety = Duration::from_secs(
                (self.config.image_cleanup_safety_window_minutes.max(0)
                    as u64)
                    * 60,
            );

            let manager = Arc::clone(manager);
            let cleaned = tokio::task::spawn_blocking(move || {
                manager.cleanup_orphaned_images(&referenced, safety)
            })
            .await
            .unwrap_or_else(|e| {
                warn!("orphan sweep worker died: {e}");
                0
            });

            let mut stats = self.stats.lock().expect("stats lock");
            stats.total_orphaned_images_cleaned += cleaned as u64;
            stats.last_orphaned_images_count = cleaned as u64;
        }

        Ok(())
    }
}
