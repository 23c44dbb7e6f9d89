//! Content-quality gate: drops blank or near-static captures before they
//! cost compression and LLM tokens.

use image::DynamicImage;
use image::imageops::FilterType;

const SAMPLE_SIZE: u32 = 64;
const MIN_CONTRAST: f64 = 8.0;
const MIN_EDGE_RATIO: f64 = 0.01;
const EDGE_DELTA: i32 = 16;

#[derive(Debug, Default, Clone)]
pub struct AnalysisStats {
    pub analyzed: u64,
    pub rejected_low_contrast: u64,
    pub rejected_low_edges: u64,
}

/// Static / blank / low-content detector over a downsampled grayscale
/// view: standard deviation of luminance for contrast, fraction of strong
/// neighbour deltas for edge density.
#[derive(Debug, Default)]
pub struct ContentAnalyzer {
    stats: AnalysisStats,
}

impl ContentAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(keep, reason)`; the reason describes the rejection and is
    /// used as a stats key upstream.
    pub fn has_significant_content(
        &mut self,
        image: &DynamicImage,
    ) -> (bool, &'static str) {
        self.stats.analyzed += 1;

        let gray = image::imageops::resize(
            &image.to_luma8(),
            SAMPLE_SIZE,
            SAMPLE_SIZE,
            FilterType::Triangle,
        );
        let pixels: Vec<f64> = gray.pixels().map(|p| p.0[0] as f64).collect();

        let mean = pixels.iter().sum::<f64>() / pixels.len() as f64;
        let variance = pixels
            .iter()
            .map(|p| (p - mean).powi(2))
            .sum::<f64>()
            / pixels.len() as f64;
        if variance.sqrt() < MIN_CONTRAST {
            self.stats.rejected_low_contrast += 1;
            return (false, "low contrast");
        }

        let mut edges = 0usize;
        let mut comparisons = 0usize;
        for y in 0..SAMPLE_SIZE {
            for x in 0..SAMPLE_SIZE {
                let here = gray.get_pixel(x, y).0[0] as i32;
                if x + 1 < SAMPLE_SIZE {
                    comparisons += 1;
                    if (here - gray.get_pixel(x + 1, y).0[0] as i32).abs()
                        > EDGE_DELTA
                    {
                        edges += 1;
                    }
                }
                if y + 1 < SAMPLE_SIZE {
                    comparisons += 1;
                    if (here - gray.get_pixel(x, y + 1).0[0] as i32).abs()
                        > EDGE_DELTA
                    {
                        edges += 1;
                    }
                }
            }
        }
        if (edges as f64) / (comparisons as f64) < MIN_EDGE_RATIO {
            self.stats.rejected_low_edges += 1;
            return (false, "low edge density");
        }

        (true, "significant content")
    }

    pub fn stats(&self) -> AnalysisStats {
        self.stats.clone()
    }

    pub fn reset_stats(&mut self) {
        self.stats = AnalysisStats::default();
    }
}
