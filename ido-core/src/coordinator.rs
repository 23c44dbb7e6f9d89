//! Agent-coordinator runtime: owns the perception drivers, the raw-record
//! queue, the processing pipeline, and the agents; drives lifecycle,
//! pause/resume across lock/sleep, and cooperative shutdown.
//!
//! Without an active LLM model the coordinator enters *restricted* mode:
//! perception still runs and screenshots are still captured, but
//! summarisation and aggregation stay disabled and `last_error` explains
//! why.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ido_config::Config;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agents::{CleanupAgent, CleanupStats, SessionAgent, SessionStats};
use crate::database::Database;
use crate::error::Result;
use crate::image::processor::ProcessorStats;
use crate::image::{ImageManager, ImageProcessor};
use crate::llm::LlmClient;
use crate::perception::{
    ActiveMonitorTracker, LockSink, PerceptionDriver, PerceptionFactory,
    RecordSink, ScreenshotCapturer,
};
use crate::processing::{PipelineStats, ProcessingPipeline, RecordQueue};

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorMode {
    Stopped,
    Running,
    /// Perception and persistence only; no LLM model is configured.
    Restricted,
}

#[derive(Debug, Default, Clone)]
pub struct CoordinatorStats {
    pub queue_len: usize,
    pub queue_dropped: u64,
    pub pipeline: Option<PipelineStats>,
    pub images: Option<ProcessorStats>,
    pub session: Option<SessionStats>,
    pub cleanup: CleanupStats,
}

pub struct Coordinator {
    config: Config,
    queue: Arc<RecordQueue>,
    tracker: Arc<ActiveMonitorTracker>,
    pipeline: Option<Arc<ProcessingPipeline>>,
    session_agent: Option<Arc<SessionAgent>>,
    cleanup_agent: Arc<CleanupAgent>,
    drivers: Vec<Box<dyn PerceptionDriver>>,
    capture_paused: Arc<AtomicBool>,
    cancel: Option<CancellationToken>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    mode: CoordinatorMode,
    last_error: Option<String>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("mode", &self.mode)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl Coordinator {
    /// Wires the component graph. `llm` being absent is not an error: the
    /// coordinator starts restricted and reports why.
    pub fn new(
        config: Config,
        db: Database,
        image_manager: Arc<ImageManager>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        let queue =
            Arc::new(RecordQueue::new(config.processing.queue_capacity));
        let tracker = Arc::new(ActiveMonitorTracker::new(
            Duration::from_secs_f64(
                config.capture.inactive_timeout_seconds.max(1.0),
            ),
        ));

        let (pipeline, session_agent, last_error) = match llm {
            Some(llm) => {
                let pipeline = Arc::new(ProcessingPipeline::new(
                    Arc::clone(&queue),
                    db.clone(),
                    Arc::clone(&image_manager),
                    Arc::clone(&llm),
                    ImageProcessor::new(&config.image_optimization),
                    config.processing.clone(),
                    config.llm.clone(),
                ));
                let session_agent = Arc::new(SessionAgent::new(
                    db.clone(),
                    llm,
                    config.session.clone(),
                    config.language.clone(),
                ));
                (Some(pipeline), Some(session_agent), None)
            }
            None => (
                None,
                None,
                Some(
                    "no active LLM model configured; summarisation and \
                     aggregation are disabled"
                        .to_string(),
                ),
            ),
        };

        let cleanup_agent = Arc::new(CleanupAgent::new(
            db,
            Some(image_manager),
            config.cleanup.clone(),
        ));

        Self {
            config,
            queue,
            tracker,
            pipeline,
            session_agent,
            cleanup_agent,
            drivers: Vec::new(),
            capture_paused: Arc::new(AtomicBool::new(false)),
            cancel: None,
            tasks: Vec::new(),
            mode: CoordinatorMode::Stopped,
            last_error,
        }
    }

    pub fn mode(&self) -> CoordinatorMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.mode != CoordinatorMode::Stopped
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn queue_sink(&self) -> RecordSink {
        let queue = Arc::clone(&self.queue);
        Arc::new(move |record| queue.push(record))
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            debug!("coordinator already running");
            return Ok(());
        }

        let cancel = CancellationToken::new();

        self.tasks.push((
            "cleanup-agent",
            self.cleanup_agent.spawn(cancel.child_token()),
        ));
        if let Some(pipeline) = &self.pipeline {
            self.tasks
                .push(("pipeline", pipeline.spawn(cancel.child_token())));
        }
        if let Some(agent) = &self.session_agent {
            self.tasks
                .push(("session-agent", agent.spawn(cancel.child_token())));
        }

        // Perception: records flow into the queue; lock/unlock maps to
        // pause/resume of the periodic agents.
        let sink = self.queue_sink();
        let lock_sink = self.lock_sink();
        let mut driver_set = PerceptionFactory::create(
            sink.clone(),
            lock_sink,
            Arc::clone(&self.tracker),
        );

        for driver in &mut driver_set.drivers {
            if let Err(e) = driver.start() {
                // One broken driver must not tear the others down.
                let message =
                    format!("perception driver {} failed: {e}", driver.name());
                warn!("{message}");
                self.last_error = Some(message);
            }
        }
        self.drivers = driver_set.drivers;

        if let Some(backend) = driver_set.capture_backend {
            let capturer = ScreenshotCapturer::new(
                backend,
                Arc::clone(&self.tracker),
                sink,
                Duration::from_secs_f64(
                    self.config.capture.screenshot_interval_seconds.max(0.1),
                ),
                Arc::clone(&self.capture_paused),
            );
            self.tasks
                .push(("screenshot", capturer.spawn(cancel.child_token())));
        }

        self.cancel = Some(cancel);
        self.mode = if self.pipeline.is_some() {
            CoordinatorMode::Running
        } else {
            warn!(
                "starting in restricted mode: {}",
                self.last_error.as_deref().unwrap_or("unknown")
            );
            CoordinatorMode::Restricted
        };
        info!(mode = ?self.mode, "coordinator started");
        Ok(())
    }

    /// Cooperative shutdown: cancel every task, await each with a cap,
    /// abandon and log the ones that do not come back in time.
    pub async fn stop(&mut self, quiet: bool) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };
        cancel.cancel();

        for (name, task) in self.tasks.drain(..) {
            match tokio::time::timeout(STOP_TIMEOUT, task).await {
                Ok(Ok(())) => debug!(task = name, "task stopped"),
                Ok(Err(e)) if e.is_cancelled() => {
                    debug!(task = name, "task cancelled")
                }
                Ok(Err(e)) => warn!(task = name, "task failed on stop: {e}"),
                Err(_) => {
                    warn!(task = name, "task ignored stop, abandoning");
                }
            }
        }

        for driver in &mut self.drivers {
            driver.stop();
        }
        self.drivers.clear();

        self.mode = CoordinatorMode::Stopped;
        if quiet {
            debug!("coordinator stopped");
        } else {
            info!("coordinator stopped");
        }
    }

    /// System going to sleep / screen locking: periodic agents skip their
    /// ticks until resume.
    pub fn pause(&self) {
        self.capture_paused.store(true, Ordering::SeqCst);
        if let Some(pipeline) = &self.pipeline {
            pipeline.pause();
        }
        if let Some(agent) = &self.session_agent {
            agent.pause();
        }
        self.cleanup_agent.pause();
        debug!("coordinator paused");
    }

    pub fn resume(&self) {
        self.capture_paused.store(false, Ordering::SeqCst);
        if let Some(pipeline) = &self.pipeline {
            pipeline.resume();
        }
        if let Some(agent) = &self.session_agent {
            agent.resume();
        }
        self.cleanup_agent.resume();
        debug!("coordinator resumed");
    }

    fn lock_sink(&self) -> LockSink {
        let pipeline = self.pipeline.clone();
        let session = self.session_agent.clone();
        let cleanup = Arc::clone(&self.cleanup_agent);
        let capture_paused = Arc::clone(&self.capture_paused);
        Arc::new(move |locked| {
            capture_paused.store(locked, Ordering::SeqCst);
            if locked {
                debug!("screen locked, pausing agents");
                if let Some(p) = &pipeline {
                    p.pause();
                }
                if let Some(s) = &session {
                    s.pause();
                }
                cleanup.pause();
            } else {
                debug!("screen unlocked, resuming agents");
                if let Some(p) = &pipeline {
                    p.resume();
                }
                if let Some(s) = &session {
                    s.resume();
                }
                cleanup.resume();
            }
        })
    }

    /// Flush the in-progress batch synchronously.
    pub async fn force_finalize_activity(&self) -> Result<()> {
        match &self.pipeline {
            Some(pipeline) => pipeline.force_finalize_activity().await,
            None => Err(crate::error::IdoError::Internal(
                self.last_error
                    .clone()
                    .unwrap_or_else(|| "pipeline unavailable".to_string()),
            )),
        }
    }

    /// Trigger one aggregation cycle outside the periodic cadence.
    pub async fn aggregate_now(&self) -> Result<()> {
        match &self.session_agent {
            Some(agent) => agent.aggregate_once().await,
            None => Err(crate::error::IdoError::Internal(
                self.last_error
                    .clone()
                    .unwrap_or_else(|| "session agent unavailable".to_string()),
            )),
        }
    }

    pub fn session_agent(&self) -> Option<&Arc<SessionAgent>> {
        self.session_agent.as_ref()
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            queue_len: self.queue.len(),
            queue_dropped: self.queue.dropped_count(),
            pipeline: self.pipeline.as_ref().map(|p| p.stats()),
            images: self.pipeline.as_ref().map(|p| p.image_stats()),
            session: self.session_agent.as_ref().map(|s| s.stats()),
            cleanup: self.cleanup_agent.stats(),
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        // Best-effort: tasks die with the runtime; drivers get told.
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        for driver in &mut self.drivers {
            driver.stop();
        }
    }
}
