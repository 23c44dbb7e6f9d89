use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ActivityId, EventId};
use crate::session_minutes;

/// Coarse session-level cluster of events.
///
/// Invariants: `session_duration_minutes` equals the floored minute span of
/// `[start_time, end_time]`; `source_event_ids` is non-empty; the times
/// equal the min/max of the referenced events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub source_event_ids: Vec<EventId>,
    pub session_duration_minutes: i64,
    #[serde(default)]
    pub topic_tags: Vec<String>,
    pub user_merged_from_ids: Option<Vec<ActivityId>>,
    pub user_split_into_ids: Option<Vec<ActivityId>>,
    #[serde(default)]
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        source_event_ids: Vec<EventId>,
        topic_tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ActivityId::new(),
            title: title.into(),
            description: description.into(),
            start_time,
            end_time,
            source_event_ids,
            session_duration_minutes: session_minutes(start_time, end_time),
            topic_tags,
            user_merged_from_ids: None,
            user_split_into_ids: None,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.end_time - self.start_time)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0
    }

    /// Re-derive the stored duration after the time range changed.
    pub fn refresh_duration(&mut self) {
        self.session_duration_minutes =
            session_minutes(self.start_time, self.end_time);
    }
}
