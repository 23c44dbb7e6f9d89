//! Core data model definitions shared across ido crates.
#![allow(missing_docs)]

pub mod activity;
pub mod entities;
pub mod event;
pub mod ids;
pub mod preference;
pub mod record;
pub mod setting;
pub mod window;

// Intentionally curated re-exports for downstream consumers.
pub use activity::Activity;
pub use entities::{Action, ActionImage};
pub use event::Event;
pub use ids::{ActionId, ActivityId, EventId, PreferenceId};
pub use preference::{PreferenceKind, SessionPreference};
pub use record::{
    FilteredRecord, KeyAction, KeySequence, KeyboardRecord, MouseAction,
    MouseButton, MouseClick, MouseRecord, RawRecord, RecordKind,
    ScreenshotRecord, ScrollBurst, SequenceMeta,
};
pub use setting::{Setting, SettingKind, SettingValue};
pub use window::{Bounds, MonitorInfo, WindowInfo};

/// Whole minutes between two instants, floored. Used for
/// `session_duration_minutes` on activities.
pub fn session_minutes(
    start: chrono::DateTime<chrono::Utc>,
    end: chrono::DateTime<chrono::Utc>,
) -> i64 {
    (end - start).num_seconds().max(0) / 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn session_minutes_floors() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 10, 20, 59).unwrap();
        assert_eq!(session_minutes(start, end), 20);
    }

    #[test]
    fn session_minutes_clamps_negative() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        assert_eq!(session_minutes(start, end), 0);
    }
}
