//! Actuator state: the single live state of each controllable device.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::command::{Command, CommandOrigin};
use crate::error::UnknownEntityError;
use crate::time::Timestamp;

/// Closed set of actuators driven by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorType {
    SmartLight,
    ClimateControl,
    FocusMode,
    NotificationSystem,
}

impl ActuatorType {
    pub const ALL: [Self; 4] = [
        Self::SmartLight,
        Self::ClimateControl,
        Self::FocusMode,
        Self::NotificationSystem,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SmartLight => "smart_light",
            Self::ClimateControl => "climate_control",
            Self::FocusMode => "focus_mode",
            Self::NotificationSystem => "notification_system",
        }
    }
}

impl fmt::Display for ActuatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActuatorType {
    type Err = UnknownEntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEntityError::new("actuator", s))
    }
}

/// Discrete operational state of an actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActuatorStatus {
    #[serde(alias = "on")]
    On,
    #[serde(alias = "off")]
    Off,
    #[serde(alias = "active")]
    Active,
    #[serde(alias = "alert")]
    Alert,
    #[serde(alias = "noisy")]
    Noisy,
    #[default]
    #[serde(alias = "unknown")]
    Unknown,
}

impl fmt::Display for ActuatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("ON"),
            Self::Off => f.write_str("OFF"),
            Self::Active => f.write_str("ACTIVE"),
            Self::Alert => f.write_str("ALERT"),
            Self::Noisy => f.write_str("NOISY"),
            Self::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// A named actuator parameter (`brightness`, `mode`, …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

/// Parameter map, ordered for stable serialization.
pub type Parameters = BTreeMap<String, ParamValue>;

/// Current state of one actuator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorState {
    pub actuator_type: ActuatorType,
    pub state: ActuatorStatus,
    pub auto_mode: bool,
    pub parameters: Parameters,
    pub last_changed: Timestamp,
    /// Who caused the last transition. `None` only for the boot state.
    pub last_changed_by: Option<CommandOrigin>,
}

impl ActuatorState {
    /// Boot state: `OFF`, automatic control enabled, no parameters.
    #[must_use]
    pub fn initial(actuator_type: ActuatorType, at: Timestamp) -> Self {
        Self {
            actuator_type,
            state: ActuatorStatus::Off,
            auto_mode: true,
            parameters: Parameters::new(),
            last_changed: at,
            last_changed_by: None,
        }
    }

    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.parameters.get(key) {
            Some(ParamValue::Number(v)) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.parameters.get(key) {
            Some(ParamValue::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Merge a command into this state.
    ///
    /// Manual commands disable automatic control unless they explicitly
    /// re-enable it. Returns `true` when anything changed; unchanged merges
    /// leave `last_changed` untouched, so applying a command twice is the
    /// same as applying it once.
    pub fn apply(&mut self, command: &Command, at: Timestamp) -> bool {
        let state = command.state.unwrap_or(self.state);
        let auto_mode = match command.origin {
            CommandOrigin::Manual => command.auto_mode.unwrap_or(false),
            CommandOrigin::Auto => command.auto_mode.unwrap_or(self.auto_mode),
        };

        let mut changed = state != self.state || auto_mode != self.auto_mode;
        for (key, value) in &command.parameters {
            if self.parameters.get(key) != Some(value) {
                self.parameters.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        self.state = state;
        self.auto_mode = auto_mode;

        if changed {
            self.last_changed = at;
            self.last_changed_by = Some(command.origin);
        }
        changed
    }
}
