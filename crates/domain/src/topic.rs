//! Topic namespace spoken on the publish/subscribe bus.
//!
//! | Topic | Direction |
//! |-------|-----------|
//! | `{base}/sensors/{type}` | sensors → hub |
//! | `{base}/commands/{type}` | anyone → hub |
//! | `{base}/actuators/{type}` | hub → actuators |
//! | `{base}/actuators/notifications` | hub → anyone |

use serde::{Deserialize, Serialize};

use crate::actuator::ActuatorType;
use crate::error::{HubError, PayloadError};
use crate::sensor::SensorType;

/// A decoded topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Sensor(SensorType),
    Command(ActuatorType),
    Actuator(ActuatorType),
    Notifications,
}

/// Builds and parses topics under a common base prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicScheme {
    base: String,
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new("room")
    }
}

impl TopicScheme {
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn sensor(&self, sensor_type: SensorType) -> String {
        format!("{}/sensors/{sensor_type}", self.base)
    }

    #[must_use]
    pub fn command(&self, actuator_type: ActuatorType) -> String {
        format!("{}/commands/{actuator_type}", self.base)
    }

    #[must_use]
    pub fn actuator(&self, actuator_type: ActuatorType) -> String {
        format!("{}/actuators/{actuator_type}", self.base)
    }

    #[must_use]
    pub fn notifications(&self) -> String {
        format!("{}/actuators/notifications", self.base)
    }

    /// Wildcard pattern covering every sensor topic.
    #[must_use]
    pub fn all_sensors(&self) -> String {
        format!("{}/sensors/+", self.base)
    }

    /// Wildcard pattern covering every command topic.
    #[must_use]
    pub fn all_commands(&self) -> String {
        format!("{}/commands/+", self.base)
    }

    /// Decode a concrete topic.
    ///
    /// # Errors
    ///
    /// [`HubError::Payload`] for topics outside the namespace,
    /// [`HubError::UnknownEntity`] for an unrecognised type segment.
    pub fn parse(&self, topic: &str) -> Result<Route, HubError> {
        let foreign = || HubError::from(PayloadError::ForeignTopic(topic.to_string()));
        let rest = topic
            .strip_prefix(self.base.as_str())
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(foreign)?;

        match rest.split('/').collect::<Vec<_>>().as_slice() {
            ["sensors", name] => Ok(Route::Sensor(name.parse()?)),
            ["commands", name] => Ok(Route::Command(name.parse()?)),
            ["actuators", "notifications"] => Ok(Route::Notifications),
            ["actuators", name] => Ok(Route::Actuator(name.parse()?)),
            _ => Err(foreign()),
        }
    }
}

/// MQTT-style topic filter matching (`+` one level, `#` remaining levels).
#[must_use]
pub fn matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_levels = pattern.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(p), Some(t)) if p == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
