//! Hub orchestration: wires the bus, store, engine, dispatcher and fanout
//! into one ingest pipeline and owns the background tasks.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use roomhub_domain::comfort::ComfortBands;
use roomhub_domain::command::{Command, CommandOrigin};
use roomhub_domain::error::HubError;
use roomhub_domain::notification::Severity;
use roomhub_domain::sensor::SensorReading;
use roomhub_domain::snapshot::Snapshot;
use roomhub_domain::time::now;
use roomhub_domain::topic::TopicScheme;

use crate::bus::codec::{self, Inbound};
use crate::bus::{BusMessage, BusStats, Inbox, MessageBus};
use crate::config::HubConfig;
use crate::dispatcher::CommandDispatcher;
use crate::engine::{ControlEngine, Trigger};
use crate::fanout::Fanout;
use crate::ports::{BusTransport, CommandSink, DispatchOutcome};
use crate::rules::{Issue, default_rules};
use crate::shutdown;
use crate::state_store::{SensorUpdate, StateStore};

type Engine<T> = ControlEngine<Arc<CommandDispatcher<T>>>;

/// The Coordination Hub.
pub struct Hub<T> {
    scheme: TopicScheme,
    tick: Duration,
    comfort: ComfortBands,
    bus: Arc<MessageBus<T>>,
    store: Arc<StateStore>,
    dispatcher: Arc<CommandDispatcher<T>>,
    engine: Arc<Engine<T>>,
    fanout: Arc<Fanout>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: BusTransport> Hub<T> {
    /// Assemble a hub over `transport`, which must deliver into `inbox`.
    #[must_use]
    pub fn new(config: HubConfig, transport: T, inbox: Inbox) -> Arc<Self> {
        let scheme = config.topics();
        let bus = Arc::new(MessageBus::new(transport, inbox, &config.bus));
        let store = Arc::new(StateStore::new(&config.store));
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&bus),
            Arc::clone(&store),
            scheme.clone(),
        ));
        let engine = Arc::new(ControlEngine::new(
            Arc::clone(&store),
            Arc::clone(&dispatcher),
            default_rules(&config.rules),
            config.notifications.clone(),
        ));
        let fanout = Arc::new(Fanout::new(Arc::clone(&store), config.comfort));
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            scheme,
            tick: Duration::from_secs(u64::from(config.engine.tick_interval_secs.max(1))),
            comfort: config.comfort,
            bus,
            store,
            dispatcher,
            engine,
            fanout,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Subscribe to inbound topics and start the background tasks.
    pub async fn start(self: &Arc<Self>) {
        self.store.set_bus_connected(self.bus.inbox().is_connected());

        for pattern in [self.scheme.all_sensors(), self.scheme.all_commands()] {
            let hub = Arc::downgrade(self);
            let subscribed = self
                .bus
                .subscribe(&pattern, move |message: BusMessage| {
                    let hub: Weak<Self> = hub.clone();
                    async move {
                        if let Some(hub) = hub.upgrade() {
                            hub.ingest(message).await;
                        }
                    }
                    .boxed()
                })
                .await;
            match subscribed {
                Ok(()) => tracing::info!(%pattern, "subscribed"),
                Err(err) => tracing::warn!(%pattern, %err, "subscribe deferred until the bus reconnects"),
            }
        }
        self.bus.start();

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(run_ticker(
            Arc::clone(&self.engine),
            self.tick,
            self.shutdown.subscribe(),
        )));
        tasks.push(tokio::spawn(watch_bus_status(
            Arc::clone(&self.store),
            Arc::clone(&self.engine),
            self.bus.inbox().status(),
            self.shutdown.subscribe(),
        )));
        tracing::info!(tick = ?self.tick, "hub started");
    }

    /// Decode and apply one inbound message. Rejections are logged, never fatal.
    pub async fn ingest(&self, message: BusMessage) {
        match codec::decode(
            &self.scheme,
            &message.topic,
            &message.payload,
            message.received_at,
        ) {
            Ok(Inbound::Sensor(reading)) => {
                self.ingest_reading(reading).await;
            }
            Ok(Inbound::Command(command)) if command.origin == CommandOrigin::Auto => {
                tracing::debug!(actuator = %command.actuator_type, "ignoring automatic command echo");
            }
            Ok(Inbound::Command(command)) => {
                let actuator = command.actuator_type;
                match self.apply_command(command).await {
                    Ok(outcome) => tracing::debug!(%actuator, ?outcome, "bus command handled"),
                    Err(err) => tracing::warn!(%actuator, %err, "bus command not applied"),
                }
            }
            Err(err) => {
                tracing::warn!(topic = %message.topic, %err, "rejected inbound message");
            }
        }
    }

    /// Store a reading and run the rules that read its type.
    ///
    /// Applied readings outside their comfort band are counted for analytics.
    pub async fn ingest_reading(&self, reading: SensorReading) -> SensorUpdate {
        let sensor_type = reading.sensor_type;
        let violated = self.comfort.violated_by(&reading);
        let update = self.store.update_sensor(reading);
        match &update {
            SensorUpdate::Applied => {
                if violated {
                    self.store.record_violation(sensor_type);
                }
                self.engine.evaluate(Trigger::Sensor(sensor_type), now()).await;
            }
            SensorUpdate::Stale(err) => tracing::info!(%err, "stale reading not applied"),
            SensorUpdate::Duplicate => {
                tracing::debug!(sensor = %sensor_type, "duplicate reading ignored");
            }
        }
        update
    }

    /// Apply a command from outside the engine, then re-evaluate.
    ///
    /// # Errors
    ///
    /// Dispatch errors ([`HubError::BusUnavailable`], [`HubError::BusTimeout`])
    /// for automatic commands.
    pub async fn apply_command(&self, command: Command) -> Result<DispatchOutcome, HubError> {
        let actuator_type = command.actuator_type;
        let outcome = self.dispatcher.dispatch_command(command, now()).await?;
        if matches!(outcome, DispatchOutcome::Applied(_)) {
            self.engine
                .evaluate(Trigger::Actuator(actuator_type), now())
                .await;
        }
        Ok(outcome)
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    #[must_use]
    pub fn fanout(&self) -> &Arc<Fanout> {
        &self.fanout
    }

    #[must_use]
    pub fn topics(&self) -> &TopicScheme {
        &self.scheme
    }

    #[must_use]
    pub fn bus_stats(&self) -> BusStats {
        self.bus.stats()
    }

    /// Stop accepting input, drain queued messages and in-flight
    /// evaluations, stop the ticker, disconnect, then end observer sessions.
    pub async fn shutdown(&self) {
        tracing::info!("hub shutting down");
        self.bus.drain().await;
        self.shutdown.send_replace(true);
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(err) = task.await {
                tracing::error!(%err, "hub task failed");
            }
        }
        self.bus.disconnect().await;
        self.fanout.close();
        tracing::info!("hub stopped");
    }
}

async fn run_ticker<S: CommandSink>(
    engine: Arc<ControlEngine<S>>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            () = shutdown::requested(&mut stop) => break,
            _ = interval.tick() => {
                engine.evaluate(Trigger::Tick, now()).await;
            }
        }
    }
    tracing::debug!("ticker stopped");
}

async fn watch_bus_status<S: CommandSink>(
    store: Arc<StateStore>,
    engine: Arc<ControlEngine<S>>,
    mut status: watch::Receiver<bool>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            () = shutdown::requested(&mut stop) => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let connected = *status.borrow_and_update();
                if !store.set_bus_connected(connected) {
                    continue;
                }
                let issue = if connected {
                    Issue::new("bus_reconnected", Severity::Info, "Message bus connection restored.")
                } else {
                    Issue::new(
                        "bus_disconnected",
                        Severity::Error,
                        "Message bus connection lost. Room data may be stale.",
                    )
                };
                engine.notify(&issue, now()).await;
            }
        }
    }
}
