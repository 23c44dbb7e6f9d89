//! Batch segmentation: a new segment opens on a time gap or when the size
//! cap is hit. Records are assumed time-ordered (the filter sorts them).

use ido_model::FilteredRecord;

pub fn segment_records(
    records: Vec<FilteredRecord>,
    time_gap_seconds: f64,
    max_records: usize,
) -> Vec<Vec<FilteredRecord>> {
    if records.is_empty() {
        return Vec::new();
    }
    let max_records = max_records.max(1);

    let mut segments = Vec::new();
    let mut current: Vec<FilteredRecord> = Vec::new();

    for record in records {
        if let Some(last) = current.last() {
            let gap = (record.timestamp() - last.timestamp())
                .num_milliseconds() as f64
                / 1000.0;
            if gap > time_gap_seconds || current.len() >= max_records {
                segments.push(std::mem::take(&mut current));
            }
        }
        current.push(record);
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use ido_model::{KeyAction, KeyboardRecord};

    fn key(seconds: i64) -> FilteredRecord {
        FilteredRecord::Keyboard(KeyboardRecord {
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
                + Duration::seconds(seconds),
            key: "a".into(),
            key_type: "key".into(),
            action: KeyAction::Press,
            modifiers: Vec::new(),
        })
    }

    #[test]
    fn splits_on_time_gap() {
        let segments =
            segment_records(vec![key(0), key(10), key(500)], 120.0, 100);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].len(), 2);
        assert_eq!(segments[1].len(), 1);
    }

    #[test]
    fn splits_on_size_cap() {
        let segments =
            segment_records(vec![key(0), key(1), key(2), key(3)], 120.0, 2);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn empty_in_empty_out() {
        assert!(segment_records(Vec::new(), 120.0, 100).is_empty());
    }
}
