//! Hash-addressed thumbnail store.
//!
//! The manager exclusively owns `<base>/thumbnails/`. Thumbnails are named
//! by the content hash of the original capture, so files outlive any
//! single action row. Methods do blocking filesystem I/O; callers on the
//! async scheduler dispatch them through `spawn_blocking`.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use lru::LruCache;
use tracing::{debug, info, warn};

use crate::error::{IdoError, Result};

const THUMBNAIL_QUALITY: u8 = 75;
/// Scale down when either side exceeds this.
const SCALE_THRESHOLD: u32 = 1440;
const SCALE_FACTOR: f64 = 0.75;

#[derive(Debug, Clone, Default)]
pub struct ImageManagerStats {
    pub memory_cache_entries: usize,
    pub disk_thumbnail_count: usize,
    pub disk_total_bytes: u64,
}

pub struct ImageManager {
    base_dir: PathBuf,
    thumbnails_dir: PathBuf,
    memory_cache: Option<Mutex<LruCache<String, String>>>,
}

impl std::fmt::Debug for ImageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageManager")
            .field("base_dir", &self.base_dir)
            .field("memory_cache", &self.memory_cache.is_some())
            .finish()
    }
}

impl ImageManager {
    /// Acquires the thumbnail directory. Failure here is fatal for
    /// startup.
    pub fn new(
        base_dir: impl Into<PathBuf>,
        memory_cache_size: usize,
        enable_memory_cache: bool,
    ) -> Result<Self> {
        let base_dir = base_dir.into();
        let thumbnails_dir = base_dir.join("thumbnails");
        std::fs::create_dir_all(&thumbnails_dir).map_err(|e| {
            IdoError::Internal(format!(
                "failed to acquire thumbnail directory {}: {e}",
                thumbnails_dir.display()
            ))
        })?;

        let memory_cache = enable_memory_cache
            .then(|| NonZeroUsize::new(memory_cache_size.max(1)))
            .flatten()
            .map(|capacity| Mutex::new(LruCache::new(capacity)));

        debug!(
            base_dir = %base_dir.display(),
            cache = enable_memory_cache,
            "image manager ready"
        );

        Ok(Self {
            base_dir,
            thumbnails_dir,
            memory_cache,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn thumbnails_dir(&self) -> &Path {
        &self.thumbnails_dir
    }

    fn thumbnail_path(&self, hash: &str) -> PathBuf {
        self.thumbnails_dir.join(format!("{hash}.jpg"))
    }

    /// Creates and persists the thumbnail for `hash`.
    pub fn process_image_for_cache(
        &self,
        hash: &str,
        bytes: &[u8],
    ) -> Result<()> {
        let thumbnail = self.create_thumbnail(bytes)?;
        std::fs::write(self.thumbnail_path(hash), &thumbnail)?;

        if let Some(cache) = &self.memory_cache
            && let Ok(mut cache) = cache.lock()
        {
            cache.put(hash.to_string(), BASE64.encode(&thumbnail));
        }

        Ok(())
    }

    fn create_thumbnail(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let decoded = image::load_from_memory(bytes)?;
        let (width, height) = (decoded.width(), decoded.height());

        let resized;
        let to_encode = if width > SCALE_THRESHOLD || height > SCALE_THRESHOLD
        {
            let target_w = ((width as f64 * SCALE_FACTOR) as u32).max(1);
            let target_h = ((height as f64 * SCALE_FACTOR) as u32).max(1);
            resized =
                decoded.resize_exact(target_w, target_h, FilterType::Lanczos3);
            &resized
        } else {
            &decoded
        };

        let mut output = Vec::new();
        let encoder =
            JpegEncoder::new_with_quality(&mut output, THUMBNAIL_QUALITY);
        to_encode.to_rgb8().write_with_encoder(encoder)?;
        Ok(output)
    }

    /// Base64 JPEG for `hash`, from the memory cache or disk.
    pub fn load_thumbnail_base64(&self, hash: &str) -> Option<String> {
        if let Some(cache) = &self.memory_cache
            && let Ok(mut cache) = cache.lock()
            && let Some(cached) = cache.get(hash)
        {
            return Some(cached.clone());
        }

        let bytes = std::fs::read(self.thumbnail_path(hash)).ok()?;
        let encoded = BASE64.encode(&bytes);
        if let Some(cache) = &self.memory_cache
            && let Ok(mut cache) = cache.lock()
        {
            cache.put(hash.to_string(), encoded.clone());
        }
        Some(encoded)
    }

    /// Deletes thumbnails whose mtime is older than `max_age`. Returns the
    /// number of files removed.
    pub fn cleanup_old_files(&self, max_age: Duration) -> usize {
        let cutoff = SystemTime::now() - max_age;
        let mut cleaned = 0usize;

        for path in self.thumbnail_files() {
            match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) if modified < cutoff => {
                    if std::fs::remove_file(&path).is_ok() {
                        cleaned += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), "failed to stat thumbnail: {e}")
                }
            }
        }

        if cleaned > 0 {
            debug!(cleaned, "removed aged thumbnails");
        }
        cleaned
    }

    /// Deletes thumbnails whose hash is not in `referenced` and whose
    /// mtime is older than the safety window. The window protects files
    /// still being written by an in-flight batch.
    pub fn cleanup_orphaned_images(
        &self,
        referenced: &HashSet<String>,
        safety_window: Duration,
    ) -> usize {
        let cutoff = SystemTime::now() - safety_window;
        let mut cleaned = 0usize;

        for path in self.thumbnail_files() {
            let Some(hash) =
                path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };

            let young = match std::fs::metadata(&path).and_then(|m| m.modified())
            {
                Ok(modified) => modified >= cutoff,
                Err(_) => true,
            };
            if young || referenced.contains(&hash) {
                continue;
            }

            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), "failed to delete orphan: {e}");
            } else {
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            info!(cleaned, "removed orphaned thumbnails");
        }
        cleaned
    }

    fn thumbnail_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.thumbnails_dir) else {
            return Vec::new();
        };
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().is_some_and(|ext| ext == "jpg")
            })
            .collect()
    }

    pub fn stats(&self) -> ImageManagerStats {
        let files = self.thumbnail_files();
        let disk_total_bytes = files
            .iter()
            .filter_map(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .sum();
        ImageManagerStats {
            memory_cache_entries: self
                .memory_cache
                .as_ref()
                .and_then(|c| c.lock().ok().map(|c| c.len()))
                .unwrap_or(0),
            disk_thumbnail_count: files.len(),
            disk_total_bytes,
        }
    }
}
