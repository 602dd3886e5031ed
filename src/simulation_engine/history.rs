use crate::shared_data::TrafficSnapshot;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bounded, append-only history of snapshots. The oldest entry is evicted
/// first once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct TrafficHistory {
    capacity: usize,
    snapshots: VecDeque<Arc<TrafficSnapshot>>,
}

impl TrafficHistory {
    /// Create a history that keeps at most `capacity` snapshots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            snapshots: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a snapshot and returns the one evicted to make room, if any.
    pub fn append(&mut self, snapshot: Arc<TrafficSnapshot>) -> Option<Arc<TrafficSnapshot>> {
        let evicted = if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front()
        } else {
            None
        };
        self.snapshots.push_back(snapshot);
        evicted
    }

    pub fn latest(&self) -> Option<Arc<TrafficSnapshot>> {
        self.snapshots.back().cloned()
    }

    /// The last `k` snapshots, oldest first. Fewer if the history is shorter.
    pub fn window(&self, k: usize) -> Vec<Arc<TrafficSnapshot>> {
        let skip = self.snapshots.len().saturating_sub(k);
        self.snapshots.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TrafficSnapshot>> {
        self.snapshots.iter()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Local, TimeZone};

    fn snapshot(minute: i64) -> Arc<TrafficSnapshot> {
        let base = Local.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap();
        Arc::new(TrafficSnapshot::new(base + Duration::minutes(minute), Vec::new()))
    }

    #[test]
    fn test_latest_on_empty_history() {
        let history = TrafficHistory::new(5);
        assert!(history.latest().is_none());
        assert!(history.window(3).is_empty());
    }

    #[test]
    fn test_fifo_eviction() {
        let mut history = TrafficHistory::new(3);
        for minute in 0..3 {
            assert!(history.append(snapshot(minute)).is_none());
        }
        let evicted = history.append(snapshot(3)).unwrap();

        assert_eq!(evicted.timestamp, snapshot(0).timestamp);
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|s| s.timestamp != snapshot(0).timestamp));
        assert_eq!(history.latest().unwrap().timestamp, snapshot(3).timestamp);
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut history = TrafficHistory::new(10);
        for minute in 0..57 {
            history.append(snapshot(minute));
            assert!(history.len() <= history.capacity());
        }
        assert_eq!(history.len(), 10);
    }

    #[test]
    fn test_window_returns_most_recent_in_order() {
        let mut history = TrafficHistory::new(10);
        for minute in 0..6 {
            history.append(snapshot(minute));
        }
        let window = history.window(3);
        let stamps: Vec<_> = window.iter().map(|s| s.timestamp).collect();
        assert_eq!(
            stamps,
            vec![
                snapshot(3).timestamp,
                snapshot(4).timestamp,
                snapshot(5).timestamp
            ]
        );
        assert_eq!(history.window(50).len(), 6);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut history = TrafficHistory::new(0);
        history.append(snapshot(0));
        history.append(snapshot(1));
        assert_eq!(history.len(), 1);
    }
}
