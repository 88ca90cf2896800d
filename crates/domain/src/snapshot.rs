//! Snapshot: an atomic, consistent read of all current hub state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::actuator::{ActuatorState, ActuatorType};
use crate::notification::Notification;
use crate::sensor::{SensorReading, SensorType};
use crate::time::Timestamp;

/// Every current reading and actuator state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Sequence number of the last hub event committed before this read.
    pub seq: u64,
    pub taken_at: Timestamp,
    /// `false` while the bus is down: data may be stale.
    pub bus_connected: bool,
    pub sensors: BTreeMap<SensorType, SensorReading>,
    pub actuators: BTreeMap<ActuatorType, ActuatorState>,
    /// Recent notifications, oldest-first.
    pub notifications: Vec<Notification>,
}

impl Snapshot {
    /// A snapshot with every actuator in its boot state and no readings.
    #[must_use]
    pub fn empty(at: Timestamp) -> Self {
        Self {
            seq: 0,
            taken_at: at,
            bus_connected: true,
            sensors: BTreeMap::new(),
            actuators: ActuatorType::ALL
                .into_iter()
                .map(|t| (t, ActuatorState::initial(t, at)))
                .collect(),
            notifications: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_reading(mut self, reading: SensorReading) -> Self {
        self.sensors.insert(reading.sensor_type, reading);
        self
    }

    #[must_use]
    pub fn with_actuator(mut self, state: ActuatorState) -> Self {
        self.actuators.insert(state.actuator_type, state);
        self
    }

    #[must_use]
    pub fn sensor(&self, sensor_type: SensorType) -> Option<&SensorReading> {
        self.sensors.get(&sensor_type)
    }

    /// Numeric value of the current reading, if any.
    #[must_use]
    pub fn number(&self, sensor_type: SensorType) -> Option<f64> {
        self.sensor(sensor_type).and_then(|r| r.value.number())
    }

    #[must_use]
    pub fn actuator(&self, actuator_type: ActuatorType) -> Option<&ActuatorState> {
        self.actuators.get(&actuator_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    #[test]
    fn should_contain_every_actuator_when_empty() {
        let snap = Snapshot::empty(now());
        assert_eq!(snap.actuators.len(), ActuatorType::ALL.len());
        assert!(snap.sensors.is_empty());
    }

    #[test]
    fn should_expose_numeric_readings() {
        let snap = Snapshot::empty(now())
            .with_reading(SensorReading::new(SensorType::Temperature, 21.0, now()))
            .with_reading(SensorReading::new(SensorType::Motion, true, now()));
        assert_eq!(snap.number(SensorType::Temperature), Some(21.0));
        assert_eq!(snap.number(SensorType::Motion), None);
        assert_eq!(snap.number(SensorType::Noise), None);
    }

    #[test]
    fn should_serialize_maps_keyed_by_type_name() {
        let snap = Snapshot::empty(now())
            .with_reading(SensorReading::new(SensorType::Humidity, 45.0, now()));
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["sensors"]["humidity"]["value"], 45.0);
        assert_eq!(json["actuators"]["smart_light"]["state"], "OFF");
    }
}
