//! Commands: transient requests to change an actuator's state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actuator::{ActuatorState, ActuatorStatus, ActuatorType, ParamValue, Parameters};
use crate::time::Timestamp;

/// Where a command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandOrigin {
    /// Issued by the control rule engine.
    Auto,
    /// Issued by a person (observer, HTTP client, external bus publisher).
    Manual,
}

impl fmt::Display for CommandOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

/// A request to change some fields of one actuator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub actuator_type: ActuatorType,
    pub state: Option<ActuatorStatus>,
    pub auto_mode: Option<bool>,
    pub parameters: Parameters,
    pub origin: CommandOrigin,
}

impl Command {
    fn empty(actuator_type: ActuatorType, origin: CommandOrigin) -> Self {
        Self {
            actuator_type,
            state: None,
            auto_mode: None,
            parameters: Parameters::new(),
            origin,
        }
    }

    /// An empty command issued by the rule engine.
    #[must_use]
    pub fn auto(actuator_type: ActuatorType) -> Self {
        Self::empty(actuator_type, CommandOrigin::Auto)
    }

    /// An empty command issued by a person.
    #[must_use]
    pub fn manual(actuator_type: ActuatorType) -> Self {
        Self::empty(actuator_type, CommandOrigin::Manual)
    }

    #[must_use]
    pub fn with_state(mut self, state: ActuatorStatus) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn with_auto_mode(mut self, auto_mode: bool) -> Self {
        self.auto_mode = Some(auto_mode);
        self
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Whether applying this command to `current` would change nothing.
    #[must_use]
    pub fn is_noop_for(&self, current: &ActuatorState) -> bool {
        let mut candidate = current.clone();
        !candidate.apply(self, current.last_changed)
    }
}

/// Wire form of a command on `room/commands/{type}` and in observer requests.
///
/// Any field that is not one of the named ones becomes a parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ActuatorStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<CommandOrigin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(flatten)]
    pub parameters: Parameters,
}

impl CommandPayload {
    /// Bind the payload to its target; a missing origin means `manual`.
    #[must_use]
    pub fn into_command(self, actuator_type: ActuatorType) -> Command {
        Command {
            actuator_type,
            state: self.state,
            auto_mode: self.auto_mode,
            parameters: self.parameters,
            origin: self.origin.unwrap_or(CommandOrigin::Manual),
        }
    }
}

impl From<&Command> for CommandPayload {
    fn from(command: &Command) -> Self {
        Self {
            state: command.state,
            auto_mode: command.auto_mode,
            origin: Some(command.origin),
            timestamp: None,
            parameters: command.parameters.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    #[test]
    fn should_default_origin_to_manual() {
        let payload: CommandPayload =
            serde_json::from_str(r#"{"state": "ON", "brightness": 80}"#).unwrap();
        let cmd = payload.into_command(ActuatorType::SmartLight);
        assert_eq!(cmd.origin, CommandOrigin::Manual);
        assert_eq!(cmd.state, Some(ActuatorStatus::On));
        assert_eq!(cmd.parameters.get("brightness"), Some(&ParamValue::Number(80.0)));
    }

    #[test]
    fn should_not_treat_timestamp_as_parameter() {
        let payload: CommandPayload =
            serde_json::from_str(r#"{"mode": "COOL", "timestamp": "2024-01-01T10:00:00Z"}"#)
                .unwrap();
        assert!(payload.timestamp.is_some());
        assert_eq!(payload.parameters.len(), 1);
    }

    #[test]
    fn should_reject_unknown_state() {
        let result: Result<CommandPayload, _> = serde_json::from_str(r#"{"state": "MELTING"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn should_detect_noop_command() {
        let state = ActuatorState::initial(ActuatorType::SmartLight, now());
        let off = Command::auto(ActuatorType::SmartLight).with_state(ActuatorStatus::Off);
        let on = Command::auto(ActuatorType::SmartLight).with_state(ActuatorStatus::On);
        assert!(off.is_noop_for(&state));
        assert!(!on.is_noop_for(&state));
    }

    #[test]
    fn should_keep_origin_in_wire_form() {
        let cmd = Command::auto(ActuatorType::FocusMode).with_state(ActuatorStatus::Alert);
        let json = serde_json::to_value(CommandPayload::from(&cmd)).unwrap();
        assert_eq!(json["origin"], "auto");
        assert_eq!(json["state"], "ALERT");
    }
}
