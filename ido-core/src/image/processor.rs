//! The per-screenshot preprocessing gate: dedup -> content analysis ->
//! compression -> sampling, with per-reason skip counters and token
//! estimates.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ido_config::ImageOptimizationConfig;
use ido_model::ScreenshotRecord;
use tracing::debug;

use crate::error::Result;

use super::analysis::ContentAnalyzer;
use super::compressor::ImageCompressor;
use super::dedup::DuplicateDetector;
use super::sampler::ImageSampler;

/// Below this best-cache similarity a frame counts as a significant change
/// and may bypass the sampling interval.
const SIGNIFICANT_CHANGE_SIMILARITY: f64 = 0.5;

/// Rough prompt-token estimate for image payloads.
fn estimate_tokens(bytes: usize) -> u64 {
    (bytes as u64 / 1024) * 85
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Kept,
    Skipped { reason: String },
}

impl ProcessOutcome {
    pub fn kept(&self) -> bool {
        matches!(self, ProcessOutcome::Kept)
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProcessorStats {
    pub images_processed: u64,
    pub images_included: u64,
    pub images_skipped: u64,
    pub skip_reasons: HashMap<String, u64>,
    pub original_tokens: u64,
    pub optimized_tokens: u64,
}

/// Unified screenshot preprocessor applied before batching.
pub struct ImageProcessor {
    dedup: Option<DuplicateDetector>,
    analyzer: Option<ContentAnalyzer>,
    compressor: ImageCompressor,
    sampler: ImageSampler,
    stats: ProcessorStats,
}

impl std::fmt::Debug for ImageProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageProcessor")
            .field("dedup", &self.dedup.is_some())
            .field("content_analysis", &self.analyzer.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

impl ImageProcessor {
    pub fn new(config: &ImageOptimizationConfig) -> Self {
        Self {
            dedup: Some(DuplicateDetector::new(
                config.phash_threshold,
                config.hash_cache_size,
            )),
            analyzer: config
                .enable_content_analysis
                .then(ContentAnalyzer::new),
            compressor: ImageCompressor::new(),
            sampler: ImageSampler::new(config.min_interval, config.max_images),
            stats: ProcessorStats::default(),
        }
    }

    /// Runs one screenshot record through the gate. On admission the
    /// record's raw bytes are replaced by the compressed base64 blob; on
    /// rejection the record should be dropped entirely.
    pub fn process(
        &mut self,
        record: &mut ScreenshotRecord,
        event_scope: &str,
        is_first: bool,
    ) -> Result<ProcessOutcome> {
        let Some(bytes) = record.bytes.take() else {
            return Ok(self.skip("no image bytes"));
        };

        self.stats.images_processed += 1;
        self.stats.original_tokens += estimate_tokens(bytes.len());

        let decoded = image::load_from_memory(&bytes)?;

        let mut significant = true;
        if let Some(dedup) = &mut self.dedup {
            let verdict = dedup.check(&decoded, record.timestamp);
            if verdict.is_duplicate {
                return Ok(self.skip("duplicate"));
            }
            significant =
                verdict.similarity < SIGNIFICANT_CHANGE_SIMILARITY;
        }

        if let Some(analyzer) = &mut self.analyzer {
            let (keep, reason) = analyzer.has_significant_content(&decoded);
            if !keep {
                return Ok(self.skip(reason));
            }
        }

        if !is_first {
            let decision = self.sampler.should_sample(
                event_scope,
                record.timestamp.timestamp_millis() as f64 / 1000.0,
                significant,
            );
            if !decision.admitted() {
                return Ok(self.skip(decision.reason()));
            }
        }

        let (compressed, meta) =
            self.compressor.compress(&decoded, bytes.len())?;
        debug!(
            hash = %record.hash,
            strategy = meta.strategy,
            ratio = meta.compression_ratio,
            "screenshot admitted"
        );

        self.stats.images_included += 1;
        self.stats.optimized_tokens += estimate_tokens(compressed.len());
        record.optimized_base64 = Some(BASE64.encode(&compressed));

        Ok(ProcessOutcome::Kept)
    }

    fn skip(&mut self, reason: &str) -> ProcessOutcome {
        self.stats.images_skipped += 1;
        *self
            .stats
            .skip_reasons
            .entry(reason.to_string())
            .or_insert(0) += 1;
        ProcessOutcome::Skipped {
            reason: reason.to_string(),
        }
    }

    /// Clear cross-batch state (hash cache, sampler scopes) without losing
    /// lifetime counters.
    pub fn reset(&mut self) {
        if let Some(dedup) = &mut self.dedup {
            dedup.reset();
        }
        self.sampler.reset();
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats.clone()
    }
}
