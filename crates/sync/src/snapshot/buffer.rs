use std::collections::VecDeque;

use super::pose::TransformSnapshot;

/// Time-ordered, bounded history of one entity's snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    snapshots: VecDeque<TransformSnapshot>,
    capacity: usize,
}

impl SnapshotBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Inserts in timestamp order, scanning from the newest end. Equal
    /// timestamps keep arrival order. The oldest entries are evicted past capacity.
    pub fn push(&mut self, snapshot: TransformSnapshot) {
        let index = self
            .snapshots
            .iter()
            .rposition(|s| s.timestamp <= snapshot.timestamp)
            .map_or(0, |i| i + 1);
        self.snapshots.insert(index, snapshot);

        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
    }

    pub fn get(&self, index: usize) -> Option<&TransformSnapshot> {
        self.snapshots.get(index)
    }

    pub fn latest(&self) -> Option<&TransformSnapshot> {
        self.snapshots.back()
    }

    pub fn oldest(&self) -> Option<&TransformSnapshot> {
        self.snapshots.front()
    }

    /// The two newest snapshots, older first.
    pub fn latest_pair(&self) -> Option<(&TransformSnapshot, &TransformSnapshot)> {
        let len = self.snapshots.len();
        if len < 2 {
            return None;
        }
        Some((&self.snapshots[len - 2], &self.snapshots[len - 1]))
    }

    /// Index `i` such that `self[i].timestamp <= time <= self[i + 1].timestamp`.
    pub fn bracket(&self, time: f64) -> Option<usize> {
        let len = self.snapshots.len();
        if len < 2 {
            return None;
        }

        (0..len - 1).rev().find(|&i| {
            self.snapshots[i].timestamp <= time && time <= self.snapshots[i + 1].timestamp
        })
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TransformSnapshot> {
        self.snapshots.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
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
}
