//! Actions and their screenshot references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ActionId, EventId};

/// Atomic summarised unit; the finest-grained persisted record. Created by
/// the processing pipeline after LLM summarisation of a record batch.
/// Immutable after creation except for the aggregation pointer, the
/// knowledge flags, and the soft-delete flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub aggregated_into_event_id: Option<EventId>,
    #[serde(default)]
    pub extract_knowledge: bool,
    #[serde(default)]
    pub knowledge_extracted: bool,
    #[serde(default)]
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Action {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        keywords: Vec<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActionId::new(),
            title: title.into(),
            description: description.into(),
            keywords,
            timestamp,
            aggregated_into_event_id: None,
            extract_knowledge: false,
            knowledge_extracted: false,
            deleted: false,
            created_at: Utc::now(),
        }
    }
}

/// Join row linking an action to one of its screenshot hashes. The union of
/// all `image_hash` values over non-deleted actions is the live reference
/// set consulted by orphan image GC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionImage {
    pub action_id: ActionId,
    pub image_hash: String,
    pub created_at: DateTime<Utc>,
}
