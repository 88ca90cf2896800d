//! Bounded drop-oldest queue between the transport thread and dispatch tasks.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use roomhub_domain::ring::RingBuffer;

/// Single-consumer queue that never blocks producers.
///
/// When full, pushing evicts the oldest undelivered item and bumps the drop
/// counter. After [`close`](Self::close) new items are refused and the
/// consumer drains what is left before [`pop`](Self::pop) returns `None`.
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
    dropped: AtomicU64,
}

struct QueueState<T> {
    items: RingBuffer<T>,
    closed: bool,
}

/// What happened to a pushed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued, but the oldest item was evicted to make room.
    Overflowed,
    /// The queue is closed; the item was discarded.
    Closed,
}

impl<T> BoundedQueue<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: RingBuffer::new(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn push(&self, item: T) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                return PushOutcome::Closed;
            }
            if state.items.push(item).is_some() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                PushOutcome::Overflowed
            } else {
                PushOutcome::Queued
            }
        };
        self.notify.notify_one();
        outcome
    }

    /// Wait for the next item. `None` once closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(item) = state.items.pop_oldest() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_one();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items evicted because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
