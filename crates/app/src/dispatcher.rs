//! Command dispatch, serialized per actuator.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use roomhub_domain::actuator::ActuatorType;
use roomhub_domain::command::{Command, CommandOrigin};
use roomhub_domain::error::{HubError, UnknownEntityError};
use roomhub_domain::notification::{Notification, Severity};
use roomhub_domain::time::Timestamp;
use roomhub_domain::topic::TopicScheme;

use crate::bus::{MessageBus, codec};
use crate::engine::DISPATCH_SOURCE;
use crate::ports::{BusTransport, CommandSink, DispatchOutcome};
use crate::state_store::StateStore;

/// Publishes actuator changes and commits them to the store.
///
/// Automatic commands are committed only once the bus accepted the new
/// state, so a failed publish leaves the actuator untouched. Manual commands
/// are committed first and broadcast best-effort; a failed broadcast raises
/// an error notification. One lock per actuator type makes publish and
/// commit atomic with respect to other commands for the same actuator.
pub struct CommandDispatcher<T> {
    bus: Arc<MessageBus<T>>,
    store: Arc<StateStore>,
    scheme: TopicScheme,
    locks: BTreeMap<ActuatorType, Mutex<()>>,
}

impl<T: BusTransport> CommandDispatcher<T> {
    #[must_use]
    pub fn new(bus: Arc<MessageBus<T>>, store: Arc<StateStore>, scheme: TopicScheme) -> Self {
        Self {
            bus,
            store,
            scheme,
            locks: ActuatorType::ALL
                .into_iter()
                .map(|t| (t, Mutex::new(())))
                .collect(),
        }
    }

    async fn dispatch(&self, command: Command, at: Timestamp) -> Result<DispatchOutcome, HubError> {
        let actuator_type = command.actuator_type;
        let unknown = || UnknownEntityError::new("actuator", actuator_type.as_str());
        let _guard = self.locks.get(&actuator_type).ok_or_else(unknown)?.lock().await;
        let current = self.store.actuator(actuator_type).ok_or_else(unknown)?;
        let topic = self.scheme.actuator(actuator_type);

        match command.origin {
            CommandOrigin::Auto => {
                if !current.auto_mode {
                    return Ok(DispatchOutcome::Overridden);
                }
                if command.is_noop_for(&current) {
                    return Ok(DispatchOutcome::Unchanged);
                }
                let mut next = current;
                next.apply(&command, at);
                self.bus
                    .publish(&topic, codec::encode_actuator(&next)?)
                    .await?;
                Ok(self
                    .store
                    .update_actuator(&command, at)?
                    .map_or(DispatchOutcome::Unchanged, DispatchOutcome::Applied))
            }
            CommandOrigin::Manual => {
                let Some(state) = self.store.update_actuator(&command, at)? else {
                    return Ok(DispatchOutcome::Unchanged);
                };
                if let Err(err) = self.bus.publish(&topic, codec::encode_actuator(&state)?).await {
                    tracing::warn!(%err, actuator = %actuator_type, "manual change committed but not broadcast");
                    self.dispatch_notification(Notification::new(
                        DISPATCH_SOURCE,
                        Severity::Error,
                        format!("{actuator_type} changed but the update was not broadcast: {err}"),
                        at,
                    ))
                    .await;
                }
                Ok(DispatchOutcome::Applied(state))
            }
        }
    }
}

impl<T: BusTransport> CommandSink for CommandDispatcher<T> {
    async fn dispatch_command(
        &self,
        command: Command,
        at: Timestamp,
    ) -> Result<DispatchOutcome, HubError> {
        let origin = command.origin;
        let actuator_type = command.actuator_type;
        let outcome = self.dispatch(command, at).await;
        match &outcome {
            Ok(DispatchOutcome::Applied(state)) => {
                tracing::info!(actuator = %actuator_type, %origin, state = %state.state, "actuator updated");
            }
            Ok(DispatchOutcome::Overridden) => {
                tracing::info!(actuator = %actuator_type, "automatic command refused, manual override active");
            }
            Ok(DispatchOutcome::Unchanged) => {}
            Err(err) => {
                tracing::warn!(%err, actuator = %actuator_type, %origin, "command dispatch failed");
            }
        }
        outcome
    }

    async fn dispatch_notification(&self, notification: Notification) {
        let payload = codec::encode_notification(&notification);
        tracing::info!(
            source_rule = %notification.source_rule,
            severity = %notification.severity,
            message = %notification.message,
            "notification raised"
        );
        self.store.push_notification(notification);
        let result = match payload {
            Ok(payload) => self.bus.publish(&self.scheme.notifications(), payload).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            tracing::debug!(%err, "notification not broadcast on the bus");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::memory::MemoryTransport;
    use crate::bus::{BusConfig, Inbox};
    use crate::state_store::StoreConfig;
    use roomhub_domain::actuator::ActuatorStatus;
    use roomhub_domain::time::now;

    struct Harness {
        transport: Arc<MemoryTransport>,
        store: Arc<StateStore>,
        dispatcher: CommandDispatcher<Arc<MemoryTransport>>,
    }

    fn harness() -> Harness {
        let config = BusConfig::default();
        let scheme = TopicScheme::default();
        let inbox = Inbox::new(&config, &scheme);
        let transport = Arc::new(MemoryTransport::new(inbox.clone()));
        let bus = Arc::new(MessageBus::new(Arc::clone(&transport), inbox, &config));
        let store = Arc::new(StateStore::new(&StoreConfig::default()));
        let dispatcher = CommandDispatcher::new(bus, Arc::clone(&store), scheme);
        Harness {
            transport,
            store,
            dispatcher,
        }
    }

    fn light_on() -> Command {
        Command::auto(ActuatorType::SmartLight)
            .with_state(ActuatorStatus::On)
            .with_param("brightness", 80.0)
    }

    #[tokio::test]
    async fn should_publish_then_commit_auto_command() {
        let h = harness();

        let outcome = h.dispatcher.dispatch_command(light_on(), now()).await.unwrap();

        assert!(matches!(outcome, DispatchOutcome::Applied(ref s) if s.state == ActuatorStatus::On));
        let published = h.transport.published_json("room/actuators/smart_light");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["state"], "ON");
        assert_eq!(published[0]["parameters"]["brightness"], 80.0);
    }

    #[tokio::test]
    async fn should_not_resend_identical_command() {
        let h = harness();
        h.dispatcher.dispatch_command(light_on(), now()).await.unwrap();

        let again = h.dispatcher.dispatch_command(light_on(), now()).await.unwrap();

        assert_eq!(again, DispatchOutcome::Unchanged);
        assert_eq!(h.transport.published().len(), 1);
    }

    #[tokio::test]
    async fn should_leave_state_untouched_when_bus_is_down() {
        let h = harness();
        h.transport.set_connected(false);

        let err = h.dispatcher.dispatch_command(light_on(), now()).await;

        assert!(matches!(err, Err(HubError::BusUnavailable)));
        let state = h.store.actuator(ActuatorType::SmartLight).unwrap();
        assert_eq!(state.state, ActuatorStatus::Off);
    }

    #[tokio::test]
    async fn should_refuse_auto_command_under_manual_override() {
        let h = harness();
        let manual = Command::manual(ActuatorType::SmartLight).with_state(ActuatorStatus::On);
        h.dispatcher.dispatch_command(manual, now()).await.unwrap();

        let outcome = h
            .dispatcher
            .dispatch_command(
                Command::auto(ActuatorType::SmartLight).with_state(ActuatorStatus::Off),
                now(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Overridden);
        let state = h.store.actuator(ActuatorType::SmartLight).unwrap();
        assert_eq!(state.state, ActuatorStatus::On);
        assert_eq!(state.last_changed_by, Some(CommandOrigin::Manual));
    }

    #[tokio::test]
    async fn should_commit_manual_command_while_disconnected() {
        let h = harness();
        h.transport.set_connected(false);

        let outcome = h
            .dispatcher
            .dispatch_command(
                Command::manual(ActuatorType::FocusMode).with_state(ActuatorStatus::Active),
                now(),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, DispatchOutcome::Applied(_)));
        assert!(!h.store.actuator(ActuatorType::FocusMode).unwrap().auto_mode);
        let notifications = h.store.snapshot().notifications;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].source_rule, DISPATCH_SOURCE);
        assert_eq!(notifications[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn should_record_and_broadcast_notification() {
        let h = harness();

        h.dispatcher
            .dispatch_notification(Notification::new("focus", Severity::Info, "Time for a break!", now()))
            .await;

        assert_eq!(h.store.snapshot().notifications.len(), 1);
        let published = h.transport.published_json("room/actuators/notifications");
        assert_eq!(published[0]["message"], "Time for a break!");
    }
}
