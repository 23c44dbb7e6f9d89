//! Multi-hash duplicate detection with scene-adaptive thresholds.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use image::DynamicImage;
use tracing::trace;

use super::hash::MultiHash;

/// Scene class derived from the best cached similarity. Static content
/// (documents, reading) dedups aggressively; video playback keeps key
/// frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneType {
    Static,
    Video,
    Normal,
}

impl SceneType {
    pub fn detect(similarity: f64) -> Self {
        if similarity >= 0.99 {
            SceneType::Static
        } else if similarity >= 0.95 {
            SceneType::Video
        } else {
            SceneType::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupVerdict {
    pub is_duplicate: bool,
    pub similarity: f64,
    pub scene: SceneType,
}

#[derive(Debug, Default, Clone)]
pub struct DedupStats {
    pub total_checked: u64,
    pub duplicates_skipped: u64,
}

/// Compares each screenshot against a bounded FIFO of recently accepted
/// multi-hashes. Duplicates are never cached, so a slow drift through many
/// near-identical frames still surfaces one representative.
#[derive(Debug)]
pub struct DuplicateDetector {
    threshold: f64,
    adaptive: bool,
    cache: VecDeque<(DateTime<Utc>, MultiHash)>,
    cache_size: usize,
    stats: DedupStats,
}

impl DuplicateDetector {
    pub fn new(threshold: f64, cache_size: usize) -> Self {
        Self {
            threshold,
            adaptive: true,
            cache: VecDeque::with_capacity(cache_size),
            cache_size: cache_size.max(1),
            stats: DedupStats::default(),
        }
    }

    pub fn with_adaptive(mut self, adaptive: bool) -> Self {
        self.adaptive = adaptive;
        self
    }

    pub fn check(
        &mut self,
        image: &DynamicImage,
        timestamp: DateTime<Utc>,
    ) -> DedupVerdict {
        self.stats.total_checked += 1;

        let hash = MultiHash::of(image);

        let mut max_similarity = 0.0f64;
        for (_, cached) in &self.cache {
            max_similarity = max_similarity.max(hash.similarity(cached));
        }

        let scene = SceneType::detect(max_similarity);
        let threshold = self.threshold_for(scene);

        if !self.cache.is_empty() && max_similarity >= threshold {
            self.stats.duplicates_skipped += 1;
            trace!(
                similarity = max_similarity,
                ?scene,
                "screenshot deduplicated"
            );
            return DedupVerdict {
                is_duplicate: true,
                similarity: max_similarity,
                scene,
            };
        }

        if self.cache.len() == self.cache_size {
            self.cache.pop_front();
        }
        self.cache.push_back((timestamp, hash));

        DedupVerdict {
            is_duplicate: false,
            similarity: max_similarity,
            scene,
        }
    }

    fn threshold_for(&self, scene: SceneType) -> f64 {
        if !self.adaptive {
            return self.threshold;
        }
        match scene {
            SceneType::Static => 0.85,
            SceneType::Video => 0.98,
            SceneType::Normal => self.threshold,
        }
    }

    pub fn reset(&mut self) {
        self.cache.clear();
    }

    pub fn stats(&self) -> DedupStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn checkerboard(cell: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, move |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        }))
    }

    #[test]
    fn first_image_is_never_a_duplicate() {
        let mut detector = DuplicateDetector::new(0.92, 10);
        let verdict = detector.check(&checkerboard(8), Utc::now());
        assert!(!verdict.is_duplicate);
        assert_eq!(verdict.similarity, 0.0);
    }

    #[test]
    fn identical_repeat_is_a_duplicate() {
        let mut detector = DuplicateDetector::new(0.92, 10);
        let img = checkerboard(8);
        detector.check(&img, Utc::now());
        let verdict = detector.check(&img, Utc::now());
        assert!(verdict.is_duplicate);
        assert_eq!(verdict.scene, SceneType::Static);
    }

    #[test]
    fn scene_type_bands() {
        assert_eq!(SceneType::detect(0.995), SceneType::Static);
        assert_eq!(SceneType::detect(0.96), SceneType::Video);
        assert_eq!(SceneType::detect(0.5), SceneType::Normal);
    }

    #[test]
    fn cache_is_bounded() {
        let mut detector = DuplicateDetector::new(0.92, 2);
        for cell in [2, 4, 8, 16] {
            detector.check(&checkerboard(cell), Utc::now());
        }
        assert!(detector.cache.len() <= 2);
    }
}
