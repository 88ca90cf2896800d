//! Message Bus Adapter.
//!
//! Sits between a [`BusTransport`] and the hub. Inbound messages are pushed by
//! the transport into an [`Inbox`] of two bounded queues (telemetry and
//! commands) and handed to subscribed handlers from the bus's own dispatch
//! tasks, so a slow handler never stalls the transport. Outbound publishes
//! fail fast while disconnected and are bounded by a deadline.

pub mod codec;
pub mod memory;
pub mod queue;

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use roomhub_domain::error::HubError;
use roomhub_domain::time::{Timestamp, now};
use roomhub_domain::topic::{TopicScheme, matches};

use crate::ports::BusTransport;

pub use self::queue::{BoundedQueue, PushOutcome};

/// Queue capacities and publish deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub telemetry_queue_capacity: usize,
    pub command_queue_capacity: usize,
    /// Deadline for publish and subscribe calls, in milliseconds.
    pub operation_timeout_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            telemetry_queue_capacity: 256,
            command_queue_capacity: 1024,
            operation_timeout_ms: 2000,
        }
    }
}

impl BusConfig {
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// One inbound message as received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: Timestamp,
}

/// Callback invoked once per matching inbound message.
pub type Handler = Arc<dyn Fn(BusMessage) -> BoxFuture<'static, ()> + Send + Sync>;

/// Queue depth and overflow counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    pub connected: bool,
    pub telemetry_queued: usize,
    pub telemetry_dropped: u64,
    pub commands_queued: usize,
    pub commands_dropped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueKind {
    Telemetry,
    Commands,
}

impl QueueKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Telemetry => "telemetry",
            Self::Commands => "commands",
        }
    }
}

struct InboxInner {
    telemetry: BoundedQueue<BusMessage>,
    commands: BoundedQueue<BusMessage>,
    command_filter: String,
    connected: watch::Sender<bool>,
}

impl InboxInner {
    fn queue(&self, kind: QueueKind) -> &BoundedQueue<BusMessage> {
        match kind {
            QueueKind::Telemetry => &self.telemetry,
            QueueKind::Commands => &self.commands,
        }
    }
}

/// Hand-off point between a transport and the bus.
///
/// Cheap to clone. Transports call [`deliver`](Self::deliver) from their
/// event loop and [`set_connected`](Self::set_connected) on every connection
/// change.
#[derive(Clone)]
pub struct Inbox {
    inner: Arc<InboxInner>,
}

impl Inbox {
    #[must_use]
    pub fn new(config: &BusConfig, scheme: &TopicScheme) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            inner: Arc::new(InboxInner {
                telemetry: BoundedQueue::new(config.telemetry_queue_capacity),
                commands: BoundedQueue::new(config.command_queue_capacity),
                command_filter: scheme.all_commands(),
                connected,
            }),
        }
    }

    /// Queue an inbound message. Never blocks.
    pub fn deliver(&self, topic: impl Into<String>, payload: Vec<u8>) -> PushOutcome {
        let message = BusMessage {
            topic: topic.into(),
            payload,
            received_at: now(),
        };
        let kind = if matches(&self.inner.command_filter, &message.topic) {
            QueueKind::Commands
        } else {
            QueueKind::Telemetry
        };
        let queue = self.inner.queue(kind);
        let outcome = queue.push(message);
        if outcome == PushOutcome::Overflowed {
            tracing::warn!(
                queue = kind.as_str(),
                dropped = queue.dropped(),
                "inbound queue full, dropped oldest message"
            );
        }
        outcome
    }

    pub fn set_connected(&self, connected: bool) {
        let changed = self.inner.connected.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
        if changed {
            tracing::info!(connected, "bus connection state changed");
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.inner.connected.borrow()
    }

    /// Watch connection changes.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    /// Refuse further messages; queued ones are still dispatched.
    pub fn close(&self) {
        self.inner.telemetry.close();
        self.inner.commands.close();
    }

    #[must_use]
    pub fn stats(&self) -> BusStats {
        BusStats {
            connected: self.is_connected(),
            telemetry_queued: self.inner.telemetry.len(),
            telemetry_dropped: self.inner.telemetry.dropped(),
            commands_queued: self.inner.commands.len(),
            commands_dropped: self.inner.commands.dropped(),
        }
    }
}

type Subscriptions = Arc<RwLock<Vec<(String, Handler)>>>;

/// Publish/subscribe facade over a [`BusTransport`].
pub struct MessageBus<T> {
    transport: T,
    inbox: Inbox,
    handlers: Subscriptions,
    timeout: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: BusTransport> MessageBus<T> {
    #[must_use]
    pub fn new(transport: T, inbox: Inbox, config: &BusConfig) -> Self {
        Self {
            transport,
            inbox,
            handlers: Arc::new(RwLock::new(Vec::new())),
            timeout: config.operation_timeout(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Publish a message.
    ///
    /// # Errors
    ///
    /// [`HubError::BusUnavailable`] immediately while disconnected, and
    /// [`HubError::BusTimeout`] when the transport does not accept the
    /// message before the deadline.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), HubError> {
        if !self.transport.is_connected() {
            return Err(HubError::BusUnavailable);
        }
        tokio::time::timeout(self.timeout, self.transport.publish(topic, payload))
            .await
            .map_err(|_| HubError::BusTimeout(self.timeout))?
    }

    /// Register `handler` for every inbound message matching `pattern`.
    ///
    /// The handler is kept even if the transport call fails: the transport
    /// re-issues subscriptions when it reconnects.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or [`HubError::BusTimeout`].
    pub async fn subscribe<F>(&self, pattern: &str, handler: F) -> Result<(), HubError>
    where
        F: Fn(BusMessage) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .push((pattern.to_string(), Arc::new(handler)));
        tokio::time::timeout(self.timeout, self.transport.subscribe(pattern))
            .await
            .map_err(|_| HubError::BusTimeout(self.timeout))?
    }

    /// Spawn one dispatch task per queue.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }
        for kind in [QueueKind::Telemetry, QueueKind::Commands] {
            let inbox = Arc::clone(&self.inbox.inner);
            let handlers = Arc::clone(&self.handlers);
            tasks.push(tokio::spawn(async move {
                dispatch_loop(kind, inbox.queue(kind), &handlers).await;
            }));
        }
    }

    /// Stop accepting messages, drain the queues, then disconnect.
    pub async fn shutdown(&self) {
        self.drain().await;
        self.disconnect().await;
    }

    /// Stop accepting messages and wait until every queued one was handled.
    pub async fn drain(&self) {
        self.inbox.close();
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(err) = task.await {
                tracing::error!(%err, "bus dispatch task failed");
            }
        }
    }

    /// Disconnect the transport, bounded by the operation timeout.
    pub async fn disconnect(&self) {
        match tokio::time::timeout(self.timeout, self.transport.disconnect()).await {
            Ok(Ok(())) => tracing::info!("bus transport disconnected"),
            Ok(Err(err)) => tracing::warn!(%err, "bus transport disconnect failed"),
            Err(_) => tracing::warn!("bus transport disconnect timed out"),
        }
    }

    #[must_use]
    pub fn stats(&self) -> BusStats {
        self.inbox.stats()
    }
}

async fn dispatch_loop(
    kind: QueueKind,
    queue: &BoundedQueue<BusMessage>,
    handlers: &Subscriptions,
) {
    tracing::debug!(queue = kind.as_str(), "bus dispatch loop started");
    while let Some(message) = queue.pop().await {
        let matching: Vec<Handler> = handlers
            .read()
            .iter()
            .filter(|(pattern, _)| matches(pattern, &message.topic))
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        if matching.is_empty() {
            tracing::debug!(topic = %message.topic, "no handler for inbound message");
        }
        for handler in matching {
            handler(message.clone()).await;
        }
    }
    tracing::debug!(queue = kind.as_str(), "bus dispatch loop drained");
}
