//! Control rules.
//!
//! Each rule reads a consistent [`RuleContext`] and returns the commands it
//! wants dispatched, the issues it currently sees and any one-off notices.
//! Rules own whatever memory they need between cycles (presence, sustained
//! noise, study session) and are evaluated with an explicit `now` so they can
//! be driven by synthetic clocks.

pub mod climate;
pub mod focus;
pub mod light_motion;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use roomhub_domain::actuator::{ActuatorState, ActuatorType};
use roomhub_domain::command::Command;
use roomhub_domain::comfort::StudySession;
use roomhub_domain::error::RuleEvaluationError;
use roomhub_domain::notification::Severity;
use roomhub_domain::sensor::{SensorReading, SensorType};
use roomhub_domain::snapshot::Snapshot;
use roomhub_domain::time::Timestamp;

pub use self::climate::{ClimateConfig, ClimateRule};
pub use self::focus::{FocusConfig, FocusRule};
pub use self::light_motion::{LightConfig, LightMotionRule};

/// Everything a rule may look at during one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub snapshot: &'a Snapshot,
    /// Recent readings per sensor type, oldest-first.
    pub history: &'a BTreeMap<SensorType, Vec<SensorReading>>,
    pub now: Timestamp,
}

impl<'a> RuleContext<'a> {
    /// # Errors
    ///
    /// [`RuleEvaluationError::MissingReading`] when no reading exists yet.
    pub fn reading(&self, sensor_type: SensorType) -> Result<&'a SensorReading, RuleEvaluationError> {
        self.snapshot
            .sensor(sensor_type)
            .ok_or(RuleEvaluationError::MissingReading(sensor_type))
    }

    /// # Errors
    ///
    /// Missing or non-numeric current reading.
    pub fn require_number(&self, sensor_type: SensorType) -> Result<f64, RuleEvaluationError> {
        self.reading(sensor_type)?
            .value
            .number()
            .ok_or(RuleEvaluationError::NonNumericReading(sensor_type))
    }

    /// # Errors
    ///
    /// [`RuleEvaluationError::MissingActuator`].
    pub fn actuator(&self, actuator_type: ActuatorType) -> Result<&'a ActuatorState, RuleEvaluationError> {
        self.snapshot
            .actuator(actuator_type)
            .ok_or(RuleEvaluationError::MissingActuator(actuator_type))
    }

    /// Numeric values of the last `count` readings, oldest-first.
    #[must_use]
    pub fn recent_numbers(&self, sensor_type: SensorType, count: usize) -> Vec<f64> {
        let Some(readings) = self.history.get(&sensor_type) else {
            return Vec::new();
        };
        let skip = readings.len().saturating_sub(count);
        readings
            .iter()
            .skip(skip)
            .filter_map(|r| r.value.number())
            .collect()
    }
}

/// A condition a rule currently considers a problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub source_rule: &'static str,
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    #[must_use]
    pub fn new(source_rule: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            source_rule,
            severity,
            message: message.into(),
        }
    }
}

/// What one rule decided in one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
    pub commands: Vec<Command>,
    /// Current problems, consolidated and rate limited by the engine.
    pub issues: Vec<Issue>,
    /// Informational notices sent as-is.
    pub notices: Vec<Issue>,
    /// Study sessions that ended this cycle.
    pub sessions: Vec<StudySession>,
}

impl RuleOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
            && self.issues.is_empty()
            && self.notices.is_empty()
            && self.sessions.is_empty()
    }
}

/// A closed-loop control rule.
pub trait Rule: Send {
    fn name(&self) -> &'static str;

    /// Sensor types whose updates should trigger this rule.
    fn inputs(&self) -> &'static [SensorType];

    /// Readings of history the rule needs per input.
    fn history_depth(&self) -> usize {
        0
    }

    /// Evaluate against the context.
    ///
    /// # Errors
    ///
    /// A required reading or actuator is missing; the engine skips the rule
    /// for this cycle.
    fn evaluate(&mut self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleEvaluationError>;
}

/// Motion presence with the instant it last flipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceTracker {
    present_since: Option<Timestamp>,
    absent_since: Option<Timestamp>,
}

/// Current presence as seen by a [`PresenceTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present { since: Timestamp },
    Absent { since: Timestamp },
}

impl PresenceTracker {
    /// Fold in the current motion reading.
    pub fn observe(&mut self, motion: &SensorReading) -> Presence {
        if motion.value.is_truthy() {
            self.absent_since = None;
            Presence::Present {
                since: *self.present_since.get_or_insert(motion.timestamp),
            }
        } else {
            self.present_since = None;
            Presence::Absent {
                since: *self.absent_since.get_or_insert(motion.timestamp),
            }
        }
    }
}

impl Presence {
    /// Absent for at least `window` as of `now`.
    #[must_use]
    pub fn is_idle(self, now: Timestamp, window: chrono::TimeDelta) -> bool {
        matches!(self, Self::Absent { since } if now - since >= window)
    }

    #[must_use]
    pub fn is_present(self) -> bool {
        matches!(self, Self::Present { .. })
    }
}

/// Thresholds for every rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub light: LightConfig,
    pub climate: ClimateConfig,
    pub focus: FocusConfig,
}

/// The standard rule set.
#[must_use]
pub fn default_rules(config: &RulesConfig) -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(LightMotionRule::new(config.light.clone())),
        Box::new(ClimateRule::new(config.climate.clone())),
        Box::new(FocusRule::new(config.focus.clone())),
    ]
}
