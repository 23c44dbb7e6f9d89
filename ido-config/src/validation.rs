//! Guard rails over loaded configuration. Violations downgrade to warnings
//! so a typo in one knob never keeps the daemon from starting.

use std::fmt;

use crate::models::Config;

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate(config: &Config) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    let unit = |v: f64| (0.0..=1.0).contains(&v);

    if !unit(config.image_optimization.phash_threshold) {
        warnings.push(ConfigWarning {
            field: "image_optimization.phash_threshold",
            message: format!(
                "{} outside [0, 1]; the default 0.92 will behave better",
                config.image_optimization.phash_threshold
            ),
        });
    }
    if config.image_optimization.max_images == 0 {
        warnings.push(ConfigWarning {
            field: "image_optimization.max_images",
            message: "0 rejects every screenshot after sampling".to_string(),
        });
    }
    if !unit(config.session.merge_similarity_threshold) {
        warnings.push(ConfigWarning {
            field: "session.merge_similarity_threshold",
            message: format!(
                "{} outside [0, 1]",
                config.session.merge_similarity_threshold
            ),
        });
    }
    if config.session.min_event_actions == 0 {
        warnings.push(ConfigWarning {
            field: "session.min_event_actions",
            message: "0 disables the event quality gate".to_string(),
        });
    }
    if config.cleanup.retention_days <= 0 {
        warnings.push(ConfigWarning {
            field: "cleanup.retention_days",
            message: format!(
                "{} would sweep current data on the next cleanup",
                config.cleanup.retention_days
            ),
        });
    }
    if config.capture.screenshot_interval_seconds <= 0.0 {
        warnings.push(ConfigWarning {
            field: "capture.screenshot_interval_seconds",
            message: "must be positive; capture task will clamp to 1s"
                .to_string(),
        });
    }
    if config.processing.queue_capacity == 0 {
        warnings.push(ConfigWarning {
            field: "processing.queue_capacity",
            message: "0 drops every record on arrival".to_string(),
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_clean() {
        assert!(validate(&Config::default()).is_empty());
    }

    #[test]
    fn flags_out_of_range_thresholds() {
        let mut config = Config::default();
        config.image_optimization.phash_threshold = 1.5;
        config.session.merge_similarity_threshold = -0.1;
        config.cleanup.retention_days = 0;
        let warnings = validate(&config);
        assert_eq!(warnings.len(), 3);
    }
}
