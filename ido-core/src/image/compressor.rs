//! Dynamic-resolution screenshot compressor.
//!
//! Strategy by pixel count, never upscaling:
//! - >= 4K (3840x2160)  -> 2K (2560x1440)
//! - >= 2K (2560x1440)  -> 1080p (1920x1080)
//! - >  1080p           -> 1080p
//! - <= 1080p           -> unchanged
//!
//! Aspect ratio is preserved; portrait captures get the target's sides
//! swapped. Output is JPEG quality 85 for LLM analysis.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::Result;

const RESOLUTION_4K: (u32, u32) = (3840, 2160);
const RESOLUTION_2K: (u32, u32) = (2560, 1440);
const RESOLUTION_1080P: (u32, u32) = (1920, 1080);
const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionMeta {
    pub original_size: usize,
    pub compressed_size: usize,
    pub compression_ratio: f64,
    pub original_dimensions: (u32, u32),
    pub final_dimensions: (u32, u32),
    pub strategy: &'static str,
}

#[derive(Debug, Default, Clone)]
pub struct CompressorStats {
    pub images_processed: u64,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
}

#[derive(Debug, Default)]
pub struct ImageCompressor {
    stats: CompressorStats,
}

impl ImageCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compress(
        &mut self,
        image: &DynamicImage,
        original_size: usize,
    ) -> Result<(Vec<u8>, CompressionMeta)> {
        self.stats.images_processed += 1;
        self.stats.original_bytes += original_size as u64;

        let original_dimensions = (image.width(), image.height());
        let target =
            target_resolution(original_dimensions.0, original_dimensions.1);

        let resized;
        let to_encode = if target != original_dimensions {
            resized = image.resize_exact(
                target.0,
                target.1,
                FilterType::Lanczos3,
            );
            &resized
        } else {
            image
        };

        let mut output = Vec::new();
        let encoder =
            JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY);
        to_encode.to_rgb8().write_with_encoder(encoder)?;

        self.stats.compressed_bytes += output.len() as u64;

        let meta = CompressionMeta {
            original_size,
            compressed_size: output.len(),
            compression_ratio: if original_size > 0 {
                output.len() as f64 / original_size as f64
            } else {
                1.0
            },
            original_dimensions,
            final_dimensions: target,
            strategy: strategy_name(original_dimensions, target),
        };

        Ok((output, meta))
    }

    pub fn stats(&self) -> CompressorStats {
        self.stats.clone()
    }
}

fn pixels(res: (u32, u32)) -> u64 {
    res.0 as u64 * res.1 as u64
}

fn target_resolution(width: u32, height: u32) -> (u32, u32) {
    let total = width as u64 * height as u64;

    let base = if total >= pixels(RESOLUTION_4K) {
        RESOLUTION_2K
    } else if total >= pixels(RESOLUTION_2K) {
        RESOLUTION_1080P
    } else if total > pixels(RESOLUTION_1080P) {
        RESOLUTION_1080P
    } else {
        return (width, height);
    };

    let target = if height > width {
        (base.1, base.0)
    } else {
        base
    };
    fit_to_resolution(width, height, target)
}

fn fit_to_resolution(
    width: u32,
    height: u32,
    (max_width, max_height): (u32, u32),
) -> (u32, u32) {
    let aspect = width as f64 / height as f64;
    let target_aspect = max_width as f64 / max_height as f64;

    if aspect > target_aspect {
        (max_width, (max_width as f64 / aspect) as u32)
    } else {
        ((max_height as f64 * aspect) as u32, max_height)
    }
}

fn strategy_name(original: (u32, u32), finished: (u32, u32)) -> &'static str {
    if original == finished {
        return "no_compression";
    }
    let total = pixels(original);
    if total >= pixels(RESOLUTION_4K) {
        "4K->2K"
    } else if total >= pixels(RESOLUTION_2K) {
        "2K->1080p"
    } else {
        "->1080p"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_images_are_untouched() {
        assert_eq!(target_resolution(1920, 1080), (1920, 1080));
        assert_eq!(target_resolution(1280, 720), (1280, 720));
    }

    #[test]
    fn four_k_maps_to_2k() {
        assert_eq!(target_resolution(3840, 2160), (2560, 1440));
    }

    #[test]
    fn two_k_maps_to_1080p() {
        assert_eq!(target_resolution(2560, 1440), (1920, 1080));
    }

    #[test]
    fn portrait_targets_are_swapped() {
        let (w, h) = target_resolution(2160, 3840);
        assert_eq!((w, h), (1440, 2560));
    }

    #[test]
    fn aspect_ratio_survives_ultrawide() {
        // 3440x1440 sits between 2K and 4K pixel counts, so it fits into
        // the 1080p box while keeping its 21:9 aspect.
        let (w, h) = target_resolution(3440, 1440);
        assert!(w <= 1920 && h <= 1080);
        let original_aspect = 3440.0 / 1440.0;
        let new_aspect = w as f64 / h as f64;
        assert!((original_aspect - new_aspect).abs() < 0.01);
    }
}
