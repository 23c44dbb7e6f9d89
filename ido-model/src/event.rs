use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ActionId, ActivityId, EventId};

/// Medium-grained cluster of actions covering one work segment.
///
/// Invariants: `start_time <= end_time`; `source_action_ids` is non-empty
/// and every referenced action exists and is non-deleted at creation time;
/// the times equal the min/max timestamps of the referenced actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub source_action_ids: Vec<ActionId>,
    pub aggregated_into_activity_id: Option<ActivityId>,
    pub version: i64,
    #[serde(default)]
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn duration_seconds(&self) -> f64 {
        (self.end_time - self.start_time)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0
    }
}
