//! Observer protocol messages.
//!
//! Every frame is `{"type": ..., "payload": ...}`; messages without a body
//! may omit `payload`.

use serde::{Deserialize, Serialize};

use roomhub_app::fanout::AnalyticsReport;
use roomhub_domain::actuator::ActuatorState;
use roomhub_domain::event::{HubEvent, HubEventKind};
use roomhub_domain::notification::Notification;
use roomhub_domain::sensor::SensorReading;
use roomhub_domain::snapshot::Snapshot;

use crate::api::commands::{CommandAck, CommandRequest};

/// Messages sent from an observer to the hub.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Manual command for one actuator.
    SendCommand(CommandRequest),
    /// Ask for a fresh comfort report.
    Analytics,
    /// Ask for the full current state again.
    RequestSnapshot,
}

/// Which part of the state an update touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sensors,
    Actuators,
}

/// Body of an `update`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UpdateData {
    Sensor(SensorReading),
    Actuator(ActuatorState),
}

/// Messages sent from the hub to an observer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame of every session, sent exactly once.
    InitialSnapshot { snapshot: Snapshot },
    /// Reply to `request_snapshot`.
    Snapshot { snapshot: Snapshot },
    Update {
        seq: u64,
        category: Category,
        #[serde(rename = "type")]
        entity_type: &'static str,
        data: UpdateData,
    },
    Alert {
        seq: u64,
        notification: Notification,
    },
    BusStatus {
        seq: u64,
        connected: bool,
    },
    Analytics(AnalyticsReport),
    CommandAck(CommandAck),
    Error {
        message: String,
    },
}

impl ServerMessage {
    /// The frame announcing one committed delta.
    #[must_use]
    pub fn from_event(event: &HubEvent) -> Self {
        let seq = event.seq;
        match &event.kind {
            HubEventKind::SensorUpdated(reading) => Self::Update {
                seq,
                category: Category::Sensors,
                entity_type: reading.sensor_type.as_str(),
                data: UpdateData::Sensor(reading.clone()),
            },
            HubEventKind::ActuatorUpdated(state) => Self::Update {
                seq,
                category: Category::Actuators,
                entity_type: state.actuator_type.as_str(),
                data: UpdateData::Actuator(state.clone()),
            },
            HubEventKind::NotificationRaised(notification) => Self::Alert {
                seq,
                notification: notification.clone(),
            },
            HubEventKind::BusStatusChanged { connected } => Self::BusStatus {
                seq,
                connected: *connected,
            },
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomhub_domain::actuator::ActuatorType;
    use roomhub_domain::notification::Severity;
    use roomhub_domain::sensor::SensorType;
    use roomhub_domain::time::now;

    #[test]
    fn should_parse_send_command() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type": "send_command", "payload": {"actuator_type": "smart_light", "command": {"state": "ON", "brightness": 60}}}"#,
        )
        .unwrap();
        let ClientMessage::SendCommand(request) = msg else {
            panic!("expected send_command");
        };
        assert_eq!(request.actuator_type, "smart_light");
        assert_eq!(request.command.parameters.len(), 1);
    }

    #[test]
    fn should_parse_requests_without_payload() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "analytics"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Analytics));
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "request_snapshot"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::RequestSnapshot));
    }

    #[test]
    fn should_reject_unknown_request() {
        let result: Result<ClientMessage, _> = serde_json::from_str(r#"{"type": "reboot"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn should_frame_sensor_delta_as_update() {
        let reading = SensorReading::new(SensorType::Humidity, 55.0, now());
        let event = HubEvent::new(9, now(), HubEventKind::SensorUpdated(reading));

        let json = serde_json::to_value(ServerMessage::from_event(&event)).unwrap();

        assert_eq!(json["type"], "update");
        assert_eq!(json["payload"]["seq"], 9);
        assert_eq!(json["payload"]["category"], "sensors");
        assert_eq!(json["payload"]["type"], "humidity");
        assert_eq!(json["payload"]["data"]["value"], 55.0);
    }

    #[test]
    fn should_frame_actuator_delta_as_update() {
        let state = ActuatorState::initial(ActuatorType::ClimateControl, now());
        let event = HubEvent::new(3, now(), HubEventKind::ActuatorUpdated(state));

        let json = serde_json::to_value(ServerMessage::from_event(&event)).unwrap();

        assert_eq!(json["payload"]["category"], "actuators");
        assert_eq!(json["payload"]["type"], "climate_control");
        assert_eq!(json["payload"]["data"]["state"], "OFF");
    }

    #[test]
    fn should_frame_notification_as_alert() {
        let notification = Notification::new("climate", Severity::Alert, "Too warm", now());
        let event = HubEvent::new(4, now(), HubEventKind::NotificationRaised(notification));

        let json = serde_json::to_value(ServerMessage::from_event(&event)).unwrap();

        assert_eq!(json["type"], "alert");
        assert_eq!(json["payload"]["notification"]["message"], "Too warm");
    }

    #[test]
    fn should_frame_bus_status() {
        let event = HubEvent::new(5, now(), HubEventKind::BusStatusChanged { connected: false });

        let json = serde_json::to_value(ServerMessage::from_event(&event)).unwrap();

        assert_eq!(json["type"], "bus_status");
        assert_eq!(json["payload"]["connected"], false);
    }
}
