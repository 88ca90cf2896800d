//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`HubError`]
//! via `#[from]` when crossing a port boundary.

use std::time::Duration;

use crate::actuator::ActuatorType;
use crate::sensor::SensorType;
use crate::time::Timestamp;

/// Top-level error for every hub operation.
///
/// None of these are fatal to the hub process: callers log them, skip the
/// affected unit of work, and surface user-visible failures as notifications.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The bus transport is disconnected; publishes fail fast until it reconnects.
    #[error("message bus unavailable")]
    BusUnavailable,

    /// A single bus operation exceeded its deadline; the caller may retry.
    #[error("message bus operation timed out after {0:?}")]
    BusTimeout(Duration),

    #[error(transparent)]
    UnknownEntity(#[from] UnknownEntityError),

    #[error(transparent)]
    StaleReading(#[from] StaleReadingError),

    #[error(transparent)]
    RuleEvaluation(#[from] RuleEvaluationError),

    #[error("invalid payload")]
    Payload(#[from] PayloadError),

    /// Opaque failure reported by a transport adapter.
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A command or reading referenced a sensor/actuator type the hub does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{name}`")]
pub struct UnknownEntityError {
    /// Which closed enumeration was being decoded (`"sensor"`, `"actuator"`, …).
    pub kind: &'static str,
    /// The rejected tag.
    pub name: String,
}

impl UnknownEntityError {
    #[must_use]
    pub fn new(kind: &'static str, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// A reading arrived with a timestamp older than the current one for its type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stale {sensor_type} reading at {timestamp} (current is {current})")]
pub struct StaleReadingError {
    pub sensor_type: SensorType,
    pub timestamp: Timestamp,
    pub current: Timestamp,
}

/// A control rule could not be evaluated this cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleEvaluationError {
    #[error("no {0} reading available")]
    MissingReading(SensorType),

    #[error("{0} reading is not numeric")]
    NonNumericReading(SensorType),

    #[error("no {0} actuator state available")]
    MissingActuator(ActuatorType),
}

/// An inbound bus message could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("malformed JSON payload")]
    Json(#[from] serde_json::Error),

    #[error("topic `{0}` is outside the hub namespace")]
    ForeignTopic(String),

    #[error("topic `{0}` does not accept inbound messages")]
    NotInbound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_unknown_entity() {
        let err = UnknownEntityError::new("actuator", "toaster");
        assert_eq!(err.to_string(), "unknown actuator `toaster`");
    }

    #[test]
    fn should_convert_unknown_entity_into_hub_error() {
        let err: HubError = UnknownEntityError::new("sensor", "pressure").into();
        assert!(matches!(err, HubError::UnknownEntity(_)));
        assert_eq!(err.to_string(), "unknown sensor `pressure`");
    }

    #[test]
    fn should_display_missing_reading() {
        let err = RuleEvaluationError::MissingReading(SensorType::Motion);
        assert_eq!(err.to_string(), "no motion reading available");
    }

    #[test]
    fn should_display_bus_timeout_with_deadline() {
        let err = HubError::BusTimeout(Duration::from_secs(2));
        assert_eq!(err.to_string(), "message bus operation timed out after 2s");
    }
}
