//! Record-level filtering and consecutive-event merging.
//!
//! Operates after the image processor has already thinned screenshots.
//! Keyboard records pass verbatim, mouse records pass when their action is
//! in the important set, screenshots pass a sliding-window rule; adjacent
//! same-kind runs are then merged and the result ordered by timestamp.

use ido_model::{
    FilteredRecord, KeySequence, MouseAction, MouseClick, RawRecord,
    ScreenshotRecord, ScrollBurst, SequenceMeta,
};
use tracing::debug;

/// Seconds separating two records, as f64.
fn gap_seconds(
    earlier: chrono::DateTime<chrono::Utc>,
    later: chrono::DateTime<chrono::Utc>,
) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 1000.0
}

const KEYBOARD_MERGE_THRESHOLD: f64 = 0.1;
const SCROLL_MERGE_THRESHOLD: f64 = 0.1;
const CLICK_MERGE_THRESHOLD: f64 = 0.5;
const SCREENSHOT_MERGE_THRESHOLD: f64 = 1.0;
const SCREENSHOT_WINDOW_SECONDS: f64 = 1.0;

#[derive(Debug)]
pub struct RecordFilter {
    min_screenshots_per_window: usize,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self::new(2)
    }
}

impl RecordFilter {
    pub fn new(min_screenshots_per_window: usize) -> Self {
        Self {
            min_screenshots_per_window,
        }
    }

    /// Type selection, window control, merging, ordering.
    pub fn filter_all(&self, records: Vec<RawRecord>) -> Vec<FilteredRecord> {
        if records.is_empty() {
            return Vec::new();
        }
        let total = records.len();

        let mut selected: Vec<RawRecord> = Vec::with_capacity(total);
        let mut screenshots: Vec<RawRecord> = Vec::new();

        for record in records {
            match &record {
                RawRecord::Keyboard(_) => selected.push(record),
                RawRecord::Mouse(mouse) => {
                    if mouse.action.is_important() {
                        selected.push(record);
                    }
                }
                RawRecord::Screenshot(_) => screenshots.push(record),
            }
        }
        selected.extend(self.window_screenshots(screenshots));

        selected.sort_by_key(|r| r.timestamp());
        let merged = merge_consecutive(selected);

        debug!(input = total, output = merged.len(), "records filtered");
        merged
    }

    /// At most `min_screenshots_per_window` screenshots per rolling
    /// 1-second window.
    fn window_screenshots(&self, records: Vec<RawRecord>) -> Vec<RawRecord> {
        let mut kept = Vec::with_capacity(records.len());
        let mut window_start = None;
        let mut in_window = 0usize;

        for record in records {
            let ts = record.timestamp();
            let start = *window_start.get_or_insert(ts);
            let mut elapsed = gap_seconds(start, ts);

            if elapsed >= SCREENSHOT_WINDOW_SECONDS {
                window_start = Some(ts);
                in_window = 0;
                elapsed = 0.0;
            }

            if elapsed < SCREENSHOT_WINDOW_SECONDS
                && in_window >= self.min_screenshots_per_window
            {
                continue;
            }

            kept.push(record);
            in_window += 1;
        }

        kept
    }
}

fn can_merge(prev: &RawRecord, curr: &RawRecord) -> bool {
    let dt = gap_seconds(prev.timestamp(), curr.timestamp());

    match (prev, curr) {
        (RawRecord::Keyboard(a), RawRecord::Keyboard(b)) => {
            dt <= KEYBOARD_MERGE_THRESHOLD && a.key == b.key
        }
        (RawRecord::Mouse(a), RawRecord::Mouse(b)) => {
            match (a.action, b.action) {
                (MouseAction::Scroll, MouseAction::Scroll) => {
                    dt <= SCROLL_MERGE_THRESHOLD
                }
                (MouseAction::Press, MouseAction::Release) => {
                    dt <= CLICK_MERGE_THRESHOLD && a.button == b.button
                }
                _ => false,
            }
        }
        (RawRecord::Screenshot(_), RawRecord::Screenshot(_)) => {
            dt <= SCREENSHOT_MERGE_THRESHOLD
        }
        _ => false,
    }
}

fn merge_consecutive(records: Vec<RawRecord>) -> Vec<FilteredRecord> {
    let mut merged = Vec::with_capacity(records.len());
    let mut group: Vec<RawRecord> = Vec::new();

    for record in records {
        if let Some(last) = group.last() {
            if can_merge(last, &record) {
                group.push(record);
                continue;
            }
            merged.push(merge_group(std::mem::take(&mut group)));
        }
        group.push(record);
    }
    if !group.is_empty() {
        merged.push(merge_group(group));
    }

    merged
}

fn merge_group(group: Vec<RawRecord>) -> FilteredRecord {
    if group.len() == 1 {
        return match group.into_iter().next().expect("single record") {
            RawRecord::Keyboard(r) => FilteredRecord::Keyboard(r),
            RawRecord::Mouse(r) => FilteredRecord::Mouse(r),
            RawRecord::Screenshot(r) => FilteredRecord::Screenshot(r),
        };
    }

    let start_time = group.first().expect("non-empty group").timestamp();
    let end_time = group.last().expect("non-empty group").timestamp();
    let duration_seconds = gap_seconds(start_time, end_time);
    let count = group.len();

    if matches!(group[0], RawRecord::Screenshot(_)) {
        // Latest hash wins so downstream cache lookups stay warm.
        let last = match group.into_iter().next_back() {
            Some(RawRecord::Screenshot(last)) => last,
            _ => unreachable!("screenshot group holds screenshots"),
        };
        return FilteredRecord::Screenshot(ScreenshotRecord {
            timestamp: start_time,
            sequence: Some(SequenceMeta {
                count,
                duration_seconds,
                start_time,
                end_time,
            }),
            ..last
        });
    }

    match &group[0] {
        RawRecord::Keyboard(first) => FilteredRecord::KeySequence(KeySequence {
            key: first.key.clone(),
            key_type: first.key_type.clone(),
            modifiers: first.modifiers.clone(),
            count,
            duration_seconds,
            start_time,
            end_time,
        }),
        RawRecord::Mouse(first) => {
            if first.action == MouseAction::Scroll {
                let (mut dx, mut dy) = (0.0, 0.0);
                let mut position = first.position;
                for record in &group {
                    if let RawRecord::Mouse(m) = record {
                        dx += m.dx.unwrap_or(0.0);
                        dy += m.dy.unwrap_or(0.0);
                        position = m.position;
                    }
                }
                FilteredRecord::Scroll(ScrollBurst {
                    position,
                    dx,
                    dy,
                    count,
                    duration_seconds,
                    start_time,
                    end_time,
                })
            } else {
                // press -> release of the same button
                let end_position = match group.last() {
                    Some(RawRecord::Mouse(last)) => last.position,
                    _ => first.position,
                };
                FilteredRecord::Click(MouseClick {
                    button: first.button,
                    start_position: first.position,
                    end_position,
                    duration_seconds,
                    start_time,
                    end_time,
                })
            }
        }
        RawRecord::Screenshot(_) => {
            unreachable!("handled above")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use ido_model::{KeyAction, KeyboardRecord, MouseButton, MouseRecord};

    fn at(ms: i64) -> chrono::DateTime<chrono::Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
            + Duration::milliseconds(ms)
    }

    fn key(ms: i64, key: &str) -> RawRecord {
        RawRecord::Keyboard(KeyboardRecord {
            timestamp: at(ms),
            key: key.to_string(),
            key_type: "key".into(),
            action: KeyAction::Press,
            modifiers: Vec::new(),
        })
    }

    fn mouse(ms: i64, action: MouseAction) -> RawRecord {
        RawRecord::Mouse(MouseRecord {
            timestamp: at(ms),
            action,
            button: Some(MouseButton::Left),
            position: (ms as i32, 0),
            dx: Some(1.0),
            dy: Some(-2.0),
        })
    }

    fn shot(ms: i64, hash: &str) -> RawRecord {
        RawRecord::Screenshot(ScreenshotRecord {
            timestamp: at(ms),
            hash: hash.to_string(),
            bytes: None,
            optimized_base64: None,
            monitor_index: Some(1),
            path: None,
            sequence: None,
        })
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(RecordFilter::default().filter_all(Vec::new()).is_empty());
    }

    #[test]
    fn mouse_moves_are_dropped() {
        let filter = RecordFilter::default();
        let out =
            filter.filter_all(vec![mouse(0, MouseAction::Move), key(500, "a")]);
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], FilteredRecord::Keyboard(_)));
    }

    #[test]
    fn key_repeats_merge_into_sequence() {
        let filter = RecordFilter::default();
        let out = filter.filter_all(vec![
            key(0, "backspace"),
            key(50, "backspace"),
            key(100, "backspace"),
            key(900, "backspace"),
        ]);
        assert_eq!(out.len(), 2);
        match &out[0] {
            FilteredRecord::KeySequence(seq) => {
                assert_eq!(seq.count, 3);
                assert_eq!(seq.key, "backspace");
            }
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn press_release_becomes_click() {
        let filter = RecordFilter::default();
        let out = filter.filter_all(vec![
            mouse(0, MouseAction::Press),
            mouse(200, MouseAction::Release),
        ]);
        assert_eq!(out.len(), 1);
        match &out[0] {
            FilteredRecord::Click(click) => {
                assert_eq!(click.button, Some(MouseButton::Left));
                assert!((click.duration_seconds - 0.2).abs() < 1e-9);
            }
            other => panic!("expected click, got {other:?}"),
        }
    }

    #[test]
    fn scrolls_sum_their_deltas() {
        let filter = RecordFilter::default();
        let out = filter.filter_all(vec![
            mouse(0, MouseAction::Scroll),
            mouse(50, MouseAction::Scroll),
            mouse(90, MouseAction::Scroll),
        ]);
        assert_eq!(out.len(), 1);
        match &out[0] {
            FilteredRecord::Scroll(burst) => {
                assert_eq!(burst.count, 3);
                assert_eq!(burst.dx, 3.0);
                assert_eq!(burst.dy, -6.0);
            }
            other => panic!("expected scroll burst, got {other:?}"),
        }
    }

    #[test]
    fn screenshot_window_caps_at_two_per_second() {
        let filter = RecordFilter::default();
        let out = filter.filter_all(vec![
            shot(0, "h1"),
            shot(100, "h2"),
            shot(200, "h3"),
            shot(300, "h4"),
        ]);
        // Two survive the window, then merge into one sequence record
        // carrying the later hash.
        assert_eq!(out.len(), 1);
        match &out[0] {
            FilteredRecord::Screenshot(s) => {
                let meta = s.sequence.as_ref().expect("sequence meta");
                assert_eq!(meta.count, 2);
                assert_eq!(s.hash, "h2");
            }
            other => panic!("expected screenshot, got {other:?}"),
        }
    }

    #[test]
    fn output_is_time_ordered() {
        let filter = RecordFilter::default();
        let out = filter.filter_all(vec![
            key(2_000, "enter"),
            shot(0, "h1"),
            mouse(5_000, MouseAction::Press),
        ]);
        let times: Vec<_> = out.iter().map(|r| r.timestamp()).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }
}
