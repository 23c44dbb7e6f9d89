//! Time/quantity sampling per event scope.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum SampleDecision {
    Admitted { reason: String },
    Rejected { reason: String },
}

impl SampleDecision {
    pub fn admitted(&self) -> bool {
        matches!(self, SampleDecision::Admitted { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            SampleDecision::Admitted { reason }
            | SampleDecision::Rejected { reason } => reason,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SamplerStats {
    pub interval_throttled: u64,
    pub quota_exceeded: u64,
}

/// Enforces a minimum inter-sample interval and a per-event image quota.
/// Significant changes bypass the interval but never the quota.
#[derive(Debug)]
pub struct ImageSampler {
    min_interval: f64,
    max_images: usize,
    last_sampled: HashMap<String, f64>,
    counts: HashMap<String, usize>,
    stats: SamplerStats,
}

impl ImageSampler {
    pub fn new(min_interval: f64, max_images: usize) -> Self {
        Self {
            min_interval,
            max_images,
            last_sampled: HashMap::new(),
            counts: HashMap::new(),
            stats: SamplerStats::default(),
        }
    }

    pub fn should_sample(
        &mut self,
        event_id: &str,
        current_time: f64,
        is_significant: bool,
    ) -> SampleDecision {
        let count = self.counts.get(event_id).copied().unwrap_or(0);

        if count >= self.max_images {
            self.stats.quota_exceeded += 1;
            return SampleDecision::Rejected {
                reason: format!("quota reached ({})", self.max_images),
            };
        }

        if is_significant {
            self.record(event_id, current_time, count);
            return SampleDecision::Admitted {
                reason: "significant change".to_string(),
            };
        }

        let last = self.last_sampled.get(event_id).copied().unwrap_or(0.0);
        let elapsed = current_time - last;
        if elapsed >= self.min_interval {
            self.record(event_id, current_time, count);
            return SampleDecision::Admitted {
                reason: format!("interval {elapsed:.1}s"),
            };
        }

        self.stats.interval_throttled += 1;
        SampleDecision::Rejected {
            reason: format!("interval below {}s", self.min_interval),
        }
    }

    fn record(&mut self, event_id: &str, current_time: f64, count: usize) {
        self.last_sampled
            .insert(event_id.to_string(), current_time);
        self.counts.insert(event_id.to_string(), count + 1);
    }

    pub fn reset(&mut self) {
        self.last_sampled.clear();
        self.counts.clear();
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_rejects_after_max() {
        let mut sampler = ImageSampler::new(2.0, 1);
        assert!(sampler.should_sample("e1", 100.0, false).admitted());
        let decision = sampler.should_sample("e1", 200.0, true);
        assert!(!decision.admitted());
        assert!(decision.reason().contains("quota"));
    }

    #[test]
    fn interval_throttles_but_significance_bypasses() {
        let mut sampler = ImageSampler::new(2.0, 8);
        assert!(sampler.should_sample("e1", 100.0, false).admitted());
        assert!(!sampler.should_sample("e1", 100.5, false).admitted());
        assert!(sampler.should_sample("e1", 100.6, true).admitted());
    }

    #[test]
    fn scopes_are_independent() {
        let mut sampler = ImageSampler::new(2.0, 1);
        assert!(sampler.should_sample("e1", 100.0, false).admitted());
        assert!(sampler.should_sample("e2", 100.0, false).admitted());
    }
}
