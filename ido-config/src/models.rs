//! Configuration models with per-section defaults.
//!
//! Every field has a default so a missing or empty `config.toml` yields a
//! fully working configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
    pub image: ImageConfig,
    pub image_optimization: ImageOptimizationConfig,
    pub session: SessionConfig,
    pub cleanup: CleanupConfig,
    pub capture: CaptureConfig,
    pub processing: ProcessingConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
    /// Language for LLM-facing prompts (`en`, `zh`, ...).
    pub language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            image: ImageConfig::default(),
            image_optimization: ImageOptimizationConfig::default(),
            session: SessionConfig::default(),
            cleanup: CleanupConfig::default(),
            capture: CaptureConfig::default(),
            processing: ProcessingConfig::default(),
            llm: LlmConfig::default(),
            logging: LoggingConfig::default(),
            language: default_language(),
        }
    }
}

impl Config {
    /// Database file, honouring `database.path` with the platform data dir
    /// as fallback (`<data>/ido/ido.db`).
    pub fn database_path(&self) -> PathBuf {
        match &self.database.path {
            Some(p) if !p.as_os_str().is_empty() => p.clone(),
            _ => default_data_dir().join("ido.db"),
        }
    }

    /// Screenshot storage root, honouring `image.storage_path` with
    /// `<data>/ido/screenshots` as fallback. Thumbnails live underneath.
    pub fn image_storage_path(&self) -> PathBuf {
        match &self.image.storage_path {
            Some(p) if !p.as_os_str().is_empty() => p.clone(),
            _ => default_data_dir().join("screenshots"),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        match &self.logging.dir {
            Some(p) if !p.as_os_str().is_empty() => p.clone(),
            _ => default_data_dir().join("logs"),
        }
    }
}

pub(crate) fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ido")
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Override for the SQLite file location.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    /// Capacity of the in-memory thumbnail cache.
    pub memory_cache_size: usize,
    /// Whether the memory cache is consulted at all.
    pub enable_memory_cache: bool,
    /// Override for the screenshot storage root.
    pub storage_path: Option<PathBuf>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            memory_cache_size: 500,
            enable_memory_cache: false,
            storage_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageOptimizationConfig {
    /// Similarity at or above which a screenshot is a duplicate (normal
    /// scenes; static/video scenes use adaptive thresholds).
    pub phash_threshold: f64,
    pub enable_content_analysis: bool,
    /// Minimum seconds between sampled images per event.
    pub min_interval: f64,
    /// Maximum images admitted per event.
    pub max_images: usize,
    /// Multi-hashes remembered for duplicate comparison.
    pub hash_cache_size: usize,
}

impl Default for ImageOptimizationConfig {
    fn default() -> Self {
        Self {
            phash_threshold: 0.92,
            enable_content_analysis: true,
            min_interval: 2.0,
            max_images: 8,
            hash_cache_size: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Seconds between aggregation cycles.
    pub aggregation_interval: u64,
    /// Reserved tuning knobs for the session window (minutes).
    pub time_window_min: u64,
    pub time_window_max: u64,
    pub min_event_duration_seconds: i64,
    pub min_event_actions: usize,
    /// Max gap (seconds) for proximity merging of adjacent activities.
    pub merge_time_gap_tolerance: i64,
    /// Minimum similarity score for proximity merging.
    pub merge_similarity_threshold: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            aggregation_interval: 1800,
            time_window_min: 30,
            time_window_max: 120,
            min_event_duration_seconds: 120,
            min_event_actions: 2,
            merge_time_gap_tolerance: 300,
            merge_similarity_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanupConfig {
    /// Seconds between cleanup sweeps.
    pub cleanup_interval: u64,
    /// Days of history to keep.
    pub retention_days: i64,
    /// Minimum file age before orphan GC may delete a thumbnail.
    pub image_cleanup_safety_window_minutes: i64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: 86_400,
            retention_days: 30,
            image_cleanup_safety_window_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Seconds between periodic screenshots.
    pub screenshot_interval_seconds: f64,
    /// Mouse idle time after which all monitors are captured.
    pub inactive_timeout_seconds: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            screenshot_interval_seconds: 1.0,
            inactive_timeout_seconds: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Seconds between pipeline ticks.
    pub tick_interval_seconds: u64,
    /// Gap (seconds) that closes a batch segment.
    pub batch_time_gap_seconds: f64,
    /// Hard cap on records per segment.
    pub batch_max_records: usize,
    /// Bounded raw-record queue capacity; overflow drops the oldest.
    pub queue_capacity: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: 60,
            batch_time_gap_seconds: 120.0,
            batch_max_records: 200,
            queue_capacity: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Active model identifier; empty means not configured.
    pub model: String,
    pub request_timeout_seconds: u64,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "IDO_LLM_API_KEY".to_string(),
            model: String::new(),
            request_timeout_seconds: 60,
            max_tokens: 1024,
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            level: "info".to_string(),
        }
    }
}

