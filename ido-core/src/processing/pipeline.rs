//! The processing pipeline: drains the raw-record queue on a cadence,
//! routes screenshots through the image processor, filters and segments
//! the batch, asks the LLM collaborator for an action summary per
//! segment, and persists actions with their image references.
//!
//! A segment whose summarisation fails is parked and retried on the next
//! tick; nothing is marked consumed until its action row exists.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use ido_config::{LlmConfig, ProcessingConfig};
use ido_model::{Action, FilteredRecord, RawRecord};
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::database::Database;
use crate::error::{IdoError, Result};
use crate::image::processor::ProcessorStats;
use crate::image::{ImageManager, ImageProcessor};
use crate::llm::{ChatMessage, LlmClient, extract_json};

use super::batch::segment_records;
use super::queue::RecordQueue;
use super::record_filter::RecordFilter;

#[derive(Debug, Default, Clone)]
pub struct PipelineStats {
    pub ticks: u64,
    pub records_drained: u64,
    pub actions_created: u64,
    pub segments_retried: u64,
}

pub struct ProcessingPipeline {
    queue: Arc<RecordQueue>,
    db: Database,
    image_manager: Arc<ImageManager>,
    llm: Arc<dyn LlmClient>,
    filter: RecordFilter,
    image_processor: StdMutex<ImageProcessor>,
    pending_segments: AsyncMutex<Vec<Vec<FilteredRecord>>>,
    tick_guard: AsyncMutex<()>,
    config: ProcessingConfig,
    llm_config: LlmConfig,
    paused: AtomicBool,
    tick_counter: AtomicU64,
    stats: StdMutex<PipelineStats>,
}

impl std::fmt::Debug for ProcessingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingPipeline")
            .field("queue_len", &self.queue.len())
            .field("paused", &self.paused.load(Ordering::Relaxed))
            .finish()
    }
}

impl ProcessingPipeline {
    pub fn new(
        queue: Arc<RecordQueue>,
        db: Database,
        image_manager: Arc<ImageManager>,
        llm: Arc<dyn LlmClient>,
        image_processor: ImageProcessor,
        config: ProcessingConfig,
        llm_config: LlmConfig,
    ) -> Self {
        Self {
            queue,
            db,
            image_manager,
            llm,
            filter: RecordFilter::default(),
            image_processor: StdMutex::new(image_processor),
            pending_segments: AsyncMutex::new(Vec::new()),
            tick_guard: AsyncMutex::new(()),
            config,
            llm_config,
            paused: AtomicBool::new(false),
            tick_counter: AtomicU64::new(0),
            stats: StdMutex::new(PipelineStats::default()),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        let interval =
            Duration::from_secs(self.config.tick_interval_seconds.max(1));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("processing pipeline cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if pipeline.paused.load(Ordering::SeqCst) {
                            debug!("pipeline paused, skipping tick");
                            continue;
                        }
                        if let Err(e) = pipeline.tick().await {
                            warn!("pipeline tick failed: {e}");
                        }
                    }
                }
            }
        })
    }

    /// Flush the current queue content synchronously.
    pub async fn force_finalize_activity(&self) -> Result<()> {
        self.tick().await
    }

    /// One drain-and-process round. Ticks are serialised; a concurrent
    /// call waits its turn rather than interleaving batches.
    pub async fn tick(&self) -> Result<()> {
        let _guard = self.tick_guard.lock().await;

        let records = self.queue.drain();
        {
            let mut stats = self.stats.lock().expect("stats lock");
            stats.ticks += 1;
            stats.records_drained += records.len() as u64;
        }

        let scope =
            self.tick_counter.fetch_add(1, Ordering::Relaxed).to_string();
        let admitted = self.preprocess_screenshots(records, &scope).await?;
        let filtered = self.filter.filter_all(admitted);

        let mut segments = {
            let mut pending = self.pending_segments.lock().await;
            std::mem::take(&mut *pending)
        };
        segments.extend(segment_records(
            filtered,
            self.config.batch_time_gap_seconds,
            self.config.batch_max_records,
        ));

        for segment in segments {
            if segment.is_empty() {
                continue;
            }
            match self.summarise_segment(&segment).await {
                Ok(action) => self.persist_action(action, &segment).await?,
                Err(e) => {
                    warn!("segment summarisation failed, parking: {e}");
                    {
                        let mut stats = self.stats.lock().expect("stats lock");
                        stats.segments_retried += 1;
                    }
                    self.pending_segments.lock().await.push(segment);
                }
            }
        }

        Ok(())
    }

    /// Runs every screenshot record through the image-processing gate and
    /// stores thumbnails for the admitted ones. Rejected records drop out
    /// of the batch entirely.
    async fn preprocess_screenshots(
        &self,
        records: Vec<RawRecord>,
        scope: &str,
    ) -> Result<Vec<RawRecord>> {
        let mut admitted = Vec::with_capacity(records.len());
        let mut first_screenshot = true;

        for record in records {
            let RawRecord::Screenshot(mut shot) = record else {
                admitted.push(record);
                continue;
            };

            let original_bytes = shot.bytes.clone();
            let outcome = {
                let mut processor =
                    self.image_processor.lock().expect("processor lock");
                processor.process(&mut shot, scope, first_screenshot)?
            };
            first_screenshot = false;

            if !outcome.kept() {
                continue;
            }

            if let Some(bytes) = original_bytes {
                let manager = Arc::clone(&self.image_manager);
                let hash = shot.hash.clone();
                let write = tokio::task::spawn_blocking(move || {
                    manager.process_image_for_cache(&hash, &bytes)
                })
                .await
                .map_err(|e| {
                    IdoError::Internal(format!("thumbnail worker died: {e}"))
                })?;
                if let Err(e) = write {
                    warn!(hash = %shot.hash, "thumbnail write failed: {e}");
                }
            }

            admitted.push(RawRecord::Screenshot(shot));
        }

        Ok(admitted)
    }

    async fn summarise_segment(
        &self,
        segment: &[FilteredRecord],
    ) -> Result<Action> {
        let records_json = segment
            .iter()
            .map(|record| match record {
                FilteredRecord::Screenshot(shot) => json!({
                    "kind": "screenshot",
                    "timestamp": shot.timestamp,
                    "hash": shot.hash,
                    "monitor_index": shot.monitor_index,
                    "sequence": shot.sequence,
                    "image_attached": shot.optimized_base64.is_some(),
                }),
                other => serde_json::to_value(other).unwrap_or_default(),
            })
            .collect::<Vec<_>>();

        let messages = [
            ChatMessage::system(
                "You summarise a short burst of desktop activity records \
                 (keyboard, mouse, screenshots) into one atomic action. \
                 Respond with JSON: {\"title\": str, \"description\": str, \
                 \"keywords\": [str]}.",
            ),
            ChatMessage::user(serde_json::to_string_pretty(&json!({
                "records": records_json,
            }))?),
        ];

        let response = self
            .llm
            .chat_completion(
                &messages,
                self.llm_config.max_tokens,
                self.llm_config.temperature,
            )
            .await?;

        let value = extract_json(&response.content)?;
        let title = value["title"].as_str().unwrap_or("Unnamed action");
        let description = value["description"].as_str().unwrap_or_default();
        let keywords = value["keywords"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|k| k.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let timestamp = segment
            .first()
            .map(|r| r.timestamp())
            .unwrap_or_else(chrono::Utc::now);

        Ok(Action::new(title, description, keywords, timestamp))
    }

    async fn persist_action(
        &self,
        action: Action,
        segment: &[FilteredRecord],
    ) -> Result<()> {
        self.db.actions.save(&action).await?;

        let mut seen = std::collections::HashSet::new();
        for record in segment {
            if let Some(hash) = record.image_hash()
                && seen.insert(hash.to_string())
            {
                self.db.actions.add_image(action.id, hash).await?;
            }
        }

        let mut stats = self.stats.lock().expect("stats lock");
        stats.actions_created += 1;
        debug!(action = %action.id, images = seen.len(), "action persisted");
        Ok(())
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats.lock().expect("stats lock").clone()
    }

    pub fn image_stats(&self) -> ProcessorStats {
        self.image_processor
            .lock()
            .expect("processor lock")
            .stats()
    }

    pub fn queue_dropped(&self) -> u64 {
        self.queue.dropped_count()
    }
}
