//! Fixed-capacity ring buffer with oldest-first eviction.

use std::collections::VecDeque;

use serde::Serialize;

/// A bounded FIFO. Pushing into a full buffer evicts the oldest element.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct RingBuffer<T> {
    #[serde(skip)]
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append at the newest end, returning the evicted element if full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Insert keeping the buffer sorted by `key`, then evict the oldest if full.
    ///
    /// Elements with equal keys keep arrival order.
    pub fn insert_ordered_by_key<K, F>(&mut self, item: T, key: F) -> Option<T>
    where
        K: Ord,
        F: Fn(&T) -> K,
    {
        let k = key(&item);
        let pos = self.items.partition_point(|existing| key(existing) <= k);
        self.items.insert(pos, item);
        if self.items.len() > self.capacity {
            self.items.pop_front()
        } else {
            None
        }
    }

    /// Remove and return the oldest element.
    pub fn pop_oldest(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest-first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }
}

impl<T: Clone> RingBuffer<T> {
    /// The most recent `limit` elements, oldest-first.
    #[must_use]
    pub fn latest(&self, limit: usize) -> Vec<T> {
        let skip = self.items.len().saturating_sub(limit);
        self.items.iter().skip(skip).cloned().collect()
    }
}
