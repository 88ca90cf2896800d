//! Loopback transport that keeps everything in process.
//!
//! Used when the hub runs without a broker and by tests. The most recent
//! published messages are recorded and, when they match a subscription, fed
//! back into the inbox like a broker would.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use roomhub_domain::error::HubError;
use roomhub_domain::ring::RingBuffer;
use roomhub_domain::topic::matches;

use super::Inbox;
use crate::ports::BusTransport;

/// Published messages kept by [`MemoryTransport::new`].
pub const DEFAULT_RECORD_CAPACITY: usize = 256;

/// In-memory [`BusTransport`].
pub struct MemoryTransport {
    inbox: Inbox,
    connected: AtomicBool,
    stalled: AtomicBool,
    subscriptions: Mutex<Vec<String>>,
    published: Mutex<RingBuffer<(String, Vec<u8>)>>,
}

impl MemoryTransport {
    /// A connected transport delivering into `inbox`.
    #[must_use]
    pub fn new(inbox: Inbox) -> Self {
        Self::with_record_capacity(inbox, DEFAULT_RECORD_CAPACITY)
    }

    /// Like [`new`](Self::new), keeping only the last `capacity` publishes.
    #[must_use]
    pub fn with_record_capacity(inbox: Inbox, capacity: usize) -> Self {
        inbox.set_connected(true);
        Self {
            inbox,
            connected: AtomicBool::new(true),
            stalled: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
            published: Mutex::new(RingBuffer::new(capacity)),
        }
    }

    /// Simulate a connection drop or recovery.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        self.inbox.set_connected(connected);
    }

    /// Make publishes hang until unstalled.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Deliver a message as if it arrived from the broker.
    pub fn inject(&self, topic: &str, payload: Vec<u8>) {
        self.inbox.deliver(topic, payload);
    }

    /// Recorded publishes, oldest-first.
    #[must_use]
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().iter().cloned().collect()
    }

    /// Payloads published on exactly `topic`, decoded as JSON.
    #[must_use]
    pub fn published_json(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published
            .lock()
            .iter()
            .filter(|(t, _)| t == topic)
            .filter_map(|(_, payload)| serde_json::from_slice(payload).ok())
            .collect()
    }

    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().clone()
    }
}

impl BusTransport for MemoryTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), HubError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if !self.is_connected() {
            return Err(HubError::BusUnavailable);
        }
        let loopback = self
            .subscriptions
            .lock()
            .iter()
            .any(|pattern| matches(pattern, topic));
        self.published
            .lock()
            .push((topic.to_string(), payload.clone()));
        if loopback {
            self.inbox.deliver(topic, payload);
        }
        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<(), HubError> {
        let mut subscriptions = self.subscriptions.lock();
        if !subscriptions.iter().any(|p| p == pattern) {
            subscriptions.push(pattern.to_string());
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), HubError> {
        self.set_connected(false);
        Ok(())
    }
}
