//! Raw perception records and their merged, filter-level forms.
//!
//! `RawRecord` is what perception drivers push into the pipeline queue. It
//! is transient: consumed within seconds, never persisted as-is, and dropped
//! when the queue overflows. `FilteredRecord` is the shape the record filter
//! emits after type selection and consecutive-event merging.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminator for the three raw record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Keyboard,
    Mouse,
    Screenshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Press,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseAction {
    Press,
    Release,
    Drag,
    DragEnd,
    Scroll,
    Move,
}

impl MouseAction {
    /// Actions worth keeping upstream. `Move` only feeds the
    /// active-monitor tracker.
    pub fn is_important(&self) -> bool {
        !matches!(self, MouseAction::Move)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyboardRecord {
    pub timestamp: DateTime<Utc>,
    pub key: String,
    pub key_type: String,
    pub action: KeyAction,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseRecord {
    pub timestamp: DateTime<Utc>,
    pub action: MouseAction,
    pub button: Option<MouseButton>,
    pub position: (i32, i32),
    pub dx: Option<f64>,
    pub dy: Option<f64>,
}

/// Metadata attached to a screenshot record that absorbed a burst of
/// near-simultaneous captures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceMeta {
    pub count: usize,
    pub duration_seconds: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRecord {
    pub timestamp: DateTime<Utc>,
    /// SHA-256 of the original capture bytes; the content identifier under
    /// which the thumbnail is stored.
    pub hash: String,
    /// Raw capture bytes, present until the image processor has consumed
    /// them. Never serialized.
    #[serde(skip)]
    pub bytes: Option<Vec<u8>>,
    /// Compressed JPEG as base64, attached by the image processor for the
    /// current batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_base64: Option<String>,
    pub monitor_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<SequenceMeta>,
}

/// A single observation from the perception layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawRecord {
    Keyboard(KeyboardRecord),
    Mouse(MouseRecord),
    Screenshot(ScreenshotRecord),
}

impl RawRecord {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            RawRecord::Keyboard(r) => r.timestamp,
            RawRecord::Mouse(r) => r.timestamp,
            RawRecord::Screenshot(r) => r.timestamp,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            RawRecord::Keyboard(_) => RecordKind::Keyboard,
            RawRecord::Mouse(_) => RecordKind::Mouse,
            RawRecord::Screenshot(_) => RecordKind::Screenshot,
        }
    }
}

/// A run of identical key events collapsed into one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySequence {
    pub key: String,
    pub key_type: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub count: usize,
    pub duration_seconds: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A press→release pair of the same button collapsed into a click.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseClick {
    pub button: Option<MouseButton>,
    pub start_position: (i32, i32),
    pub end_position: (i32, i32),
    pub duration_seconds: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Adjacent scroll events summed into one burst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollBurst {
    pub position: (i32, i32),
    pub dx: f64,
    pub dy: f64,
    pub count: usize,
    pub duration_seconds: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Output of the record filter: type-selected records with consecutive
/// same-kind runs merged, ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilteredRecord {
    Keyboard(KeyboardRecord),
    KeySequence(KeySequence),
    Mouse(MouseRecord),
    Click(MouseClick),
    Scroll(ScrollBurst),
    Screenshot(ScreenshotRecord),
}

impl FilteredRecord {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            FilteredRecord::Keyboard(r) => r.timestamp,
            FilteredRecord::KeySequence(r) => r.start_time,
            FilteredRecord::Mouse(r) => r.timestamp,
            FilteredRecord::Click(r) => r.start_time,
            FilteredRecord::Scroll(r) => r.start_time,
            FilteredRecord::Screenshot(r) => r.timestamp,
        }
    }

    /// Hash of the referenced screenshot, when the record carries one.
    pub fn image_hash(&self) -> Option<&str> {
        match self {
            FilteredRecord::Screenshot(r) => Some(r.hash.as_str()),
            _ => None,
        }
    }
}
