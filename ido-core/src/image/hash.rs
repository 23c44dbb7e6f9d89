//! Perceptual hashing for screenshot deduplication.
//!
//! Three 64-bit hashes are combined into a weighted [`MultiHash`]:
//! `phash` (DCT structure, weight 0.5), `dhash` (gradients, 0.3) and
//! `average_hash` (coarse luminance, 0.2). Per-algorithm similarity is
//! `1 - hamming/64`; the weighted sum gives the scalar the duplicate
//! detector thresholds against.

use image::{DynamicImage, GrayImage, imageops::FilterType};

const PHASH_WEIGHT: f64 = 0.5;
const DHASH_WEIGHT: f64 = 0.3;
const AHASH_WEIGHT: f64 = 0.2;

/// Weighted combination of perceptual hashes for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiHash {
    pub phash: u64,
    pub dhash: u64,
    pub ahash: u64,
}

impl MultiHash {
    pub fn of(image: &DynamicImage) -> Self {
        let gray = image.to_luma8();
        Self {
            phash: phash(&gray),
            dhash: dhash(&gray),
            ahash: average_hash(&gray),
        }
    }

    /// Weighted similarity in `[0, 1]`. Symmetric in its arguments.
    pub fn similarity(&self, other: &MultiHash) -> f64 {
        let per_bit = |a: u64, b: u64| 1.0 - hamming(a, b) as f64 / 64.0;
        per_bit(self.phash, other.phash) * PHASH_WEIGHT
            + per_bit(self.dhash, other.dhash) * DHASH_WEIGHT
            + per_bit(self.ahash, other.ahash) * AHASH_WEIGHT
    }
}

pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

fn resize_gray(gray: &GrayImage, width: u32, height: u32) -> GrayImage {
    image::imageops::resize(gray, width, height, FilterType::Lanczos3)
}

/// 8x8 mean-threshold hash.
fn average_hash(gray: &GrayImage) -> u64 {
    let small = resize_gray(gray, 8, 8);
    let pixels: Vec<f64> =
        small.pixels().map(|p| p.0[0] as f64).collect();
    let mean = pixels.iter().sum::<f64>() / pixels.len() as f64;
    pack_bits(pixels.iter().map(|&p| p > mean))
}

/// 9x8 horizontal-gradient hash.
fn dhash(gray: &GrayImage) -> u64 {
    let small = resize_gray(gray, 9, 8);
    let mut bits = Vec::with_capacity(64);
    for y in 0..8 {
        for x in 0..8 {
            bits.push(
                small.get_pixel(x, y).0[0] < small.get_pixel(x + 1, y).0[0],
            );
        }
    }
    pack_bits(bits.into_iter())
}

/// DCT hash: 32x32 DCT-II, median-threshold over the low-frequency 8x8
/// block.
fn phash(gray: &GrayImage) -> u64 {
    const N: usize = 32;
    let small = resize_gray(gray, N as u32, N as u32);
    let mut values = [[0f64; N]; N];
    for y in 0..N {
        for x in 0..N {
            values[y][x] = small.get_pixel(x as u32, y as u32).0[0] as f64;
        }
    }

    // Separable DCT-II: rows, then columns.
    let mut rows = [[0f64; N]; N];
    for y in 0..N {
        rows[y] = dct_1d(&values[y]);
    }
    let mut low = [0f64; 64];
    for u in 0..8 {
        let mut column = [0f64; N];
        for y in 0..N {
            column[y] = rows[y][u];
        }
        let transformed = dct_1d(&column);
        for v in 0..8 {
            low[v * 8 + u] = transformed[v];
        }
    }

    let mut sorted = low;
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = (sorted[31] + sorted[32]) / 2.0;
    pack_bits(low.iter().map(|&c| c > median))
}

fn dct_1d<const N: usize>(input: &[f64; N]) -> [f64; N] {
    let mut output = [0f64; N];
    for (k, out) in output.iter_mut().enumerate() {
        let mut sum = 0.0;
        for (n, &value) in input.iter().enumerate() {
            sum += value
                * (std::f64::consts::PI / N as f64
                    * (n as f64 + 0.5)
                    * k as f64)
                    .cos();
        }
        *out = sum;
    }
    output
}

fn pack_bits(bits: impl Iterator<Item = bool>) -> u64 {
    bits.take(64)
        .fold(0u64, |acc, bit| (acc << 1) | bit as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient_image(seed: u32) -> DynamicImage {
        let img = RgbImage::from_fn(64, 64, |x, y| {
            let v = ((x * 3 + y * 5 + seed) % 256) as u8;
            Rgb([v, v / 2, 255 - v])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn identical_images_have_similarity_one() {
        let img = gradient_image(0);
        let a = MultiHash::of(&img);
        let b = MultiHash::of(&img);
        assert_eq!(a, b);
        assert!((a.similarity(&b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = MultiHash::of(&gradient_image(0));
        let b = MultiHash::of(&gradient_image(120));
        assert_eq!(a.similarity(&b), b.similarity(&a));
    }

    #[test]
    fn weights_sum_to_one() {
        assert!((PHASH_WEIGHT + DHASH_WEIGHT + AHASH_WEIGHT - 1.0).abs() < 1e-9);
    }

    #[test]
    fn hamming_counts_differing_bits() {
        assert_eq!(hamming(0, u64::MAX), 64);
        assert_eq!(hamming(0b1010, 0b0110), 2);
    }
}
