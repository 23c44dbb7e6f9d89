use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::PreferenceId;

/// What kind of aggregation preference was learned from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceKind {
    MergePattern,
    SplitPattern,
    TimeThreshold,
}

impl PreferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceKind::MergePattern => "merge_pattern",
            PreferenceKind::SplitPattern => "split_pattern",
            PreferenceKind::TimeThreshold => "time_threshold",
        }
    }
}

impl FromStr for PreferenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge_pattern" => Ok(PreferenceKind::MergePattern),
            "split_pattern" => Ok(PreferenceKind::SplitPattern),
            "time_threshold" => Ok(PreferenceKind::TimeThreshold),
            other => Err(format!("unknown preference kind: {other}")),
        }
    }
}

impl fmt::Display for PreferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule learned from a user merge/split operation. Additive: duplicates
/// are reinforced through `times_observed`, never de-duplicated on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPreference {
    pub id: PreferenceId,
    pub kind: PreferenceKind,
    pub description: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// At least 1.
    pub times_observed: i64,
    pub last_observed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SessionPreference {
    pub fn new(kind: PreferenceKind, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PreferenceId::new(),
            kind,
            description: description.into(),
            confidence: 0.6,
            times_observed: 1,
            last_observed: now,
            created_at: now,
        }
    }
}
