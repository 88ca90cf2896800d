//! [`BusTransport`] implementation on an `rumqttc` client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::task::JoinHandle;

use roomhub_app::bus::Inbox;
use roomhub_app::ports::BusTransport;
use roomhub_domain::error::HubError;

use crate::backoff::Backoff;
use crate::config::MqttConfig;
use crate::error::MqttError;

struct Shared {
    connected: AtomicBool,
    stopping: AtomicBool,
    subscriptions: Mutex<Vec<String>>,
    inbox: Inbox,
}

impl Shared {
    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        self.inbox.set_connected(connected);
    }
}

/// MQTT connection driving the hub's inbox.
pub struct MqttTransport {
    client: AsyncClient,
    shared: Arc<Shared>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl MqttTransport {
    /// Create the client and spawn its event loop. Connection happens in
    /// the background; until the first CONNACK publishes fail fast.
    #[must_use]
    pub fn connect(config: &MqttConfig, inbox: Inbox) -> Self {
        let mut options = MqttOptions::new(
            config.client_id.clone(),
            config.broker_host.clone(),
            config.broker_port,
        );
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(true);
        let (client, event_loop) = AsyncClient::new(options, config.request_capacity.max(1));

        let shared = Arc::new(Shared {
            connected: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
            inbox,
        });
        let backoff = Backoff::new(config.reconnect_initial(), config.reconnect_max());
        let handle = tokio::spawn(run_event_loop(
            event_loop,
            client.clone(),
            Arc::clone(&shared),
            backoff,
        ));
        tracing::info!(
            host = %config.broker_host,
            port = config.broker_port,
            client_id = %config.client_id,
            "MQTT transport started"
        );

        Self {
            client,
            shared,
            event_loop: Mutex::new(Some(handle)),
        }
    }
}

async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    shared: Arc<Shared>,
    mut backoff: Backoff,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("MQTT connected");
                backoff.reset();
                shared.set_connected(true);
                let patterns = shared.subscriptions.lock().clone();
                for pattern in patterns {
                    if let Err(err) = client.try_subscribe(pattern.as_str(), QoS::AtLeastOnce) {
                        tracing::warn!(%pattern, %err, "MQTT resubscribe failed");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let topic: &[u8] = publish.topic.as_ref();
                let topic = String::from_utf8_lossy(topic).into_owned();
                shared.inbox.deliver(topic, publish.payload.to_vec());
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::warn!("MQTT broker closed the session");
                shared.set_connected(false);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                shared.set_connected(false);
                break;
            }
            Ok(_) => {}
            Err(err) => {
                shared.set_connected(false);
                if shared.stopping.load(Ordering::SeqCst) {
                    break;
                }
                let delay = backoff.next_delay();
                tracing::warn!(%err, ?delay, "MQTT connection error, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
    tracing::info!("MQTT event loop stopped");
}

impl BusTransport for MqttTransport {
    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), HubError> {
        if !self.is_connected() {
            return Err(MqttError::NotConnected.into());
        }
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|err| MqttError::from(err).into())
    }

    async fn subscribe(&self, pattern: &str) -> Result<(), HubError> {
        {
            let mut subscriptions = self.shared.subscriptions.lock();
            if !subscriptions.iter().any(|p| p == pattern) {
                subscriptions.push(pattern.to_string());
            }
        }
        if !self.is_connected() {
            tracing::debug!(%pattern, "subscription recorded, issued on connect");
            return Ok(());
        }
        self.client
            .subscribe(pattern, QoS::AtLeastOnce)
            .await
            .map_err(|err| MqttError::from(err).into())
    }

    async fn disconnect(&self) -> Result<(), HubError> {
        self.shared.stopping.store(true, Ordering::SeqCst);
        let was_connected = self.is_connected();
        let handle = self.event_loop.lock().take();
        if was_connected {
            self.client
                .disconnect()
                .await
                .map_err(MqttError::from)?;
        }
        if let Some(handle) = handle {
            if was_connected {
                if let Err(err) = handle.await {
                    tracing::warn!(%err, "MQTT event loop task failed");
                }
            } else {
                handle.abort();
            }
        }
        self.shared.set_connected(false);
        Ok(())
    }
}
