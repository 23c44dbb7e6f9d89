//! Bounded in-memory raw-record queue.
//!
//! Drivers push from their own threads; the pipeline drains on its tick.
//! Overflow drops the *oldest* records (screenshots are re-captured on the
//! next tick anyway) and counts the loss.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use ido_model::RawRecord;
use tracing::trace;

#[derive(Debug)]
pub struct RecordQueue {
    inner: Mutex<VecDeque<RawRecord>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl RecordQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn push(&self, record: RawRecord) {
        let mut queue = self.inner.lock().expect("queue lock");
        while queue.len() >= self.capacity {
            queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queue.push_back(record);
    }

    /// Takes every queued record, oldest first.
    pub fn drain(&self) -> Vec<RawRecord> {
        let mut queue = self.inner.lock().expect("queue lock");
        let drained: Vec<RawRecord> = queue.drain(..).collect();
        if !drained.is_empty() {
            trace!(count = drained.len(), "queue drained");
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ido_model::{KeyAction, KeyboardRecord};

    fn key_record(key: &str) -> RawRecord {
        RawRecord::Keyboard(KeyboardRecord {
            timestamp: Utc::now(),
            key: key.to_string(),
            key_type: "key".into(),
            action: KeyAction::Press,
            modifiers: Vec::new(),
        })
    }

    #[test]
    fn overflow_drops_oldest() {
        let queue = RecordQueue::new(2);
        queue.push(key_record("a"));
        queue.push(key_record("b"));
        queue.push(key_record("c"));

        assert_eq!(queue.dropped_count(), 1);
        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        match &drained[0] {
            RawRecord::Keyboard(k) => assert_eq!(k.key, "b"),
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[test]
    fn drain_empties_the_queue() {
        let queue = RecordQueue::new(8);
        queue.push(key_record("a"));
        assert_eq!(queue.drain().len(), 1);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }
}
