//! Hub events: one delta per committed state change.
//!
//! Events carry a per-hub sequence number assigned at commit time, giving
//! observers a total order over sensor, actuator and notification changes.

use serde::{Deserialize, Serialize};

use crate::actuator::ActuatorState;
use crate::notification::Notification;
use crate::sensor::SensorReading;
use crate::time::Timestamp;

/// What changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum HubEventKind {
    SensorUpdated(SensorReading),
    ActuatorUpdated(ActuatorState),
    NotificationRaised(Notification),
    BusStatusChanged { connected: bool },
}

/// A committed change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubEvent {
    pub seq: u64,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub kind: HubEventKind,
}

impl HubEvent {
    #[must_use]
    pub fn new(seq: u64, timestamp: Timestamp, kind: HubEventKind) -> Self {
        Self {
            seq,
            timestamp,
            kind,
        }
    }
}
