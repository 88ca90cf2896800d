//! JSON payload codec for the topic namespace.
//!
//! Inbound payloads are decoded into tagged variants at the boundary; unknown
//! sensor or actuator tags are rejected instead of coerced.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use roomhub_domain::actuator::{ActuatorState, ActuatorStatus, Parameters};
use roomhub_domain::command::{Command, CommandPayload};
use roomhub_domain::error::{HubError, PayloadError};
use roomhub_domain::notification::{Notification, Severity};
use roomhub_domain::sensor::{SensorReading, SensorType, SensorValue};
use roomhub_domain::time::Timestamp;
use roomhub_domain::topic::{Route, TopicScheme};

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Sensor(SensorReading),
    Command(Command),
}

#[derive(Debug, Deserialize)]
struct SensorPayload {
    value: SensorValue,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// `room/actuators/{type}` payload.
#[derive(Debug, Serialize)]
struct ActuatorPayload<'a> {
    state: ActuatorStatus,
    auto_mode: bool,
    parameters: &'a Parameters,
    timestamp: Timestamp,
}

/// `room/actuators/notifications` payload.
#[derive(Debug, Serialize)]
struct NotificationPayload<'a> {
    message: &'a str,
    severity: Severity,
    timestamp: Timestamp,
    source_rule: &'a str,
}

/// Decode an inbound message on one of the hub's subscribed topics.
///
/// Sensor readings without a timestamp are stamped with `received_at`.
///
/// # Errors
///
/// [`HubError::UnknownEntity`] for unknown type segments,
/// [`HubError::Payload`] for malformed JSON or topics the hub does not consume.
pub fn decode(
    scheme: &TopicScheme,
    topic: &str,
    payload: &[u8],
    received_at: Timestamp,
) -> Result<Inbound, HubError> {
    match scheme.parse(topic)? {
        Route::Sensor(sensor_type) => {
            decode_reading(sensor_type, payload, received_at).map(Inbound::Sensor)
        }
        Route::Command(actuator_type) => {
            let body: CommandPayload =
                serde_json::from_slice(payload).map_err(PayloadError::from)?;
            Ok(Inbound::Command(body.into_command(actuator_type)))
        }
        Route::Actuator(_) | Route::Notifications => {
            Err(PayloadError::NotInbound(topic.to_string()).into())
        }
    }
}

fn decode_reading(
    sensor_type: SensorType,
    payload: &[u8],
    received_at: Timestamp,
) -> Result<SensorReading, HubError> {
    let body: SensorPayload = serde_json::from_slice(payload).map_err(PayloadError::from)?;
    let timestamp = body
        .timestamp
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(received_at);
    let reading = SensorReading::new(sensor_type, body.value, timestamp);
    Ok(match body.unit {
        Some(unit) => reading.with_unit(unit),
        None => reading,
    })
}

/// Parse RFC 3339, falling back to an offset-less ISO 8601 local time read as UTC.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Encode an actuator state broadcast.
///
/// # Errors
///
/// Returns [`HubError::Payload`] if serialization fails.
pub fn encode_actuator(state: &ActuatorState) -> Result<Vec<u8>, HubError> {
    let body = ActuatorPayload {
        state: state.state,
        auto_mode: state.auto_mode,
        parameters: &state.parameters,
        timestamp: state.last_changed,
    };
    serde_json::to_vec(&body).map_err(|err| PayloadError::from(err).into())
}

/// Encode a notification for the notification stream.
///
/// # Errors
///
/// Returns [`HubError::Payload`] if serialization fails.
pub fn encode_notification(notification: &Notification) -> Result<Vec<u8>, HubError> {
    let body = NotificationPayload {
        message: &notification.message,
        severity: notification.severity,
        timestamp: notification.timestamp,
        source_rule: &notification.source_rule,
    };
    serde_json::to_vec(&body).map_err(|err| PayloadError::from(err).into())
}
