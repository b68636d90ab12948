use std::collections::VecDeque;

/// Bounded FIFO of recently kept message texts.
///
/// Only kept messages are recorded, in the order they were kept. Once more than
/// `capacity` entries exist the oldest ones are evicted.
#[derive(Clone, Debug)]
pub struct RecentHistory {
    capacity: usize,
    entries: VecDeque<String>,
}

impl RecentHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Seed from persisted state. Entries are oldest-first; if there are more than
    /// `capacity` of them only the newest survive.
    pub fn restore(capacity: usize, entries: impl IntoIterator<Item = String>) -> Self {
        let mut h = Self::new(capacity);
        for e in entries {
            h.record(e);
        }
        h
    }

    pub fn record(&mut self, text: impl Into<String>) {
        self.entries.push_back(text.into());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        // Keep the ring in one segment so `as_slice` sees every entry.
        self.entries.make_contiguous();
    }

    /// Read-only view for the distance stage.
    pub fn as_slice(&self) -> &[String] {
        self.entries.as_slices().0
    }

    /// Owned copy for persistence, oldest-first.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_exceeds_capacity_and_evicts_oldest_first() {
        let mut h = RecentHistory::new(3);
        for i in 0..10 {
            h.record(format!("t{i}"));
            assert!(h.len() <= 3);
        }
        assert_eq!(h.snapshot(), vec!["t7", "t8", "t9"]);
    }

    #[test]
    fn restore_keeps_newest_entries() {
        let saved = (0..5).map(|i| format!("s{i}"));
        let h = RecentHistory::restore(2, saved);
        assert_eq!(h.snapshot(), vec!["s3", "s4"]);
    }

    #[test]
    fn as_slice_is_contiguous_after_wraparound() {
        let mut h = RecentHistory::new(2);
        h.record("a");
        h.record("b");
        h.record("c");
        assert_eq!(h.snapshot(), vec!["b", "c"]);
        assert_eq!(h.as_slice(), ["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut h = RecentHistory::new(0);
        h.record("a");
        h.record("b");
        assert_eq!(h.capacity(), 1);
        assert_eq!(h.snapshot(), vec!["b"]);
    }
}
