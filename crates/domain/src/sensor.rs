//! Sensor readings: immutable telemetry samples published by room sensors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownEntityError;
use crate::time::Timestamp;

/// Closed set of sensor kinds the hub understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Temperature,
    Humidity,
    Light,
    Noise,
    Motion,
}

impl SensorType {
    /// Every sensor type, in display order.
    pub const ALL: [Self; 5] = [
        Self::Temperature,
        Self::Humidity,
        Self::Light,
        Self::Noise,
        Self::Motion,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Light => "light",
            Self::Noise => "noise",
            Self::Motion => "motion",
        }
    }

    /// Unit assumed when a producer omits one.
    #[must_use]
    pub fn default_unit(self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity => "%",
            Self::Light => "lux",
            Self::Noise => "dB",
            Self::Motion => "",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorType {
    type Err = UnknownEntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEntityError::new("sensor", s))
    }
}

/// Measured value: numeric for analog sensors, boolean for motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Flag(bool),
    Number(f64),
}

impl SensorValue {
    /// Numeric view of the value. Flags map to `1.0` / `0.0`.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Number(v) => v,
            Self::Flag(true) => 1.0,
            Self::Flag(false) => 0.0,
        }
    }

    /// Only genuine numbers, never flags.
    #[must_use]
    pub fn number(self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(v),
            Self::Flag(_) => None,
        }
    }

    /// Presence view of the value: `true`, or any non-zero number.
    #[must_use]
    pub fn is_truthy(self) -> bool {
        match self {
            Self::Flag(b) => b,
            Self::Number(v) => v != 0.0,
        }
    }
}

impl From<f64> for SensorValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for SensorValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

/// A single immutable sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_type: SensorType,
    pub value: SensorValue,
    pub unit: String,
    pub timestamp: Timestamp,
}

impl SensorReading {
    /// Create a reading using the sensor type's default unit.
    #[must_use]
    pub fn new(sensor_type: SensorType, value: impl Into<SensorValue>, timestamp: Timestamp) -> Self {
        Self {
            sensor_type,
            value: value.into(),
            unit: sensor_type.default_unit().to_string(),
            timestamp,
        }
    }

    /// Override the unit.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}
