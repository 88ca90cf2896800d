//! In-process event bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use roomhub_domain::event::HubEvent;

/// In-process delta bus using a tokio [`broadcast`] channel.
///
/// Publishing never blocks and succeeds even when there are no active
/// subscribers (the event is simply dropped). Each subscriber has its own
/// bounded view of the channel: a slow subscriber loses its oldest events
/// instead of holding back the publisher.
pub struct InProcessEventBus {
    sender: broadcast::Sender<HubEvent>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given per-subscriber capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.sender.subscribe()
    }

    /// Broadcast an event to all current subscribers.
    pub fn publish(&self, event: HubEvent) {
        // send fails only when there are zero receivers, which is fine.
        let _ = self.sender.send(event);
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomhub_domain::event::HubEventKind;
    use roomhub_domain::time::now;

    fn status_event(seq: u64) -> HubEvent {
        HubEvent::new(seq, now(), HubEventKind::BusStatusChanged { connected: true })
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(status_event(1));

        assert_eq!(rx1.recv().await.unwrap().seq, 1);
        assert_eq!(rx2.recv().await.unwrap().seq, 1);
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        bus.publish(status_event(1));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.publish(status_event(1));

        let mut rx = bus.subscribe();
        bus.publish(status_event(2));

        assert_eq!(rx.recv().await.unwrap().seq, 2);
    }

    #[tokio::test]
    async fn should_drop_oldest_for_lagging_subscriber() {
        let bus = InProcessEventBus::new(2);
        let mut rx = bus.subscribe();
        for seq in 1..=4 {
            bus.publish(status_event(seq));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(rx.recv().await.unwrap().seq, 3);
        assert_eq!(rx.recv().await.unwrap().seq, 4);
    }
}
