//! Bus transport port: the raw publish/subscribe connection.

use std::future::Future;
use std::sync::Arc;

use roomhub_domain::error::HubError;

/// A publish/subscribe connection to the message broker.
///
/// Inbound messages are not returned from here: implementations push them
/// into the [`Inbox`](crate::bus::Inbox) they were constructed with, and
/// report connection changes through it as well.
pub trait BusTransport: Send + Sync + 'static {
    /// Whether the connection is currently up.
    fn is_connected(&self) -> bool;

    /// Hand a message to the broker.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Subscribe to a topic filter. Implementations re-issue every filter
    /// after a reconnect.
    fn subscribe(&self, pattern: &str) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Close the connection.
    fn disconnect(&self) -> impl Future<Output = Result<(), HubError>> + Send;
}

impl<T: BusTransport> BusTransport for Arc<T> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).publish(topic, payload)
    }

    fn subscribe(&self, pattern: &str) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).subscribe(pattern)
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).disconnect()
    }
}
