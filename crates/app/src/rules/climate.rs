//! Temperature–climate loop with a cooldown before switching off.

use serde::{Deserialize, Serialize};

use roomhub_domain::actuator::{ActuatorStatus, ActuatorType};
use roomhub_domain::command::Command;
use roomhub_domain::error::RuleEvaluationError;
use roomhub_domain::notification::Severity;
use roomhub_domain::sensor::SensorType;
use roomhub_domain::time::seconds;

use super::{Issue, Rule, RuleContext, RuleOutcome};

const NAME: &str = "climate";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateConfig {
    pub target: f64,
    pub band_min: f64,
    pub band_max: f64,
    /// Seconds since the last climate change before it may switch off.
    pub cooldown_secs: u32,
    pub humidity_alert_above: f64,
    pub safe_min: f64,
    pub safe_max: f64,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            target: 22.0,
            band_min: 20.0,
            band_max: 24.0,
            cooldown_secs: 300,
            humidity_alert_above: 70.0,
            safe_min: 16.0,
            safe_max: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Heat,
    Cool,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
        }
    }
}

pub struct ClimateRule {
    config: ClimateConfig,
}

impl ClimateRule {
    #[must_use]
    pub fn new(config: ClimateConfig) -> Self {
        Self { config }
    }
}

impl Rule for ClimateRule {
    fn name(&self) -> &'static str {
        NAME
    }

    fn inputs(&self) -> &'static [SensorType] {
        &[SensorType::Temperature, SensorType::Humidity]
    }

    fn evaluate(&mut self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleEvaluationError> {
        let temperature = ctx.require_number(SensorType::Temperature)?;
        let climate = ctx.actuator(ActuatorType::ClimateControl)?;
        let cfg = &self.config;
        let mut outcome = RuleOutcome::default();

        let wanted = if temperature > cfg.band_max {
            Some(Mode::Cool)
        } else if temperature < cfg.band_min {
            Some(Mode::Heat)
        } else {
            None
        };

        match wanted {
            Some(mode) => {
                let running = climate.state == ActuatorStatus::Active
                    && climate.text("mode") == Some(mode.as_str());
                if !running {
                    outcome.commands.push(
                        Command::auto(ActuatorType::ClimateControl)
                            .with_state(ActuatorStatus::Active)
                            .with_param("mode", mode.as_str())
                            .with_param("target", cfg.target),
                    );
                }
            }
            None => {
                let settled = ctx.now - climate.last_changed >= seconds(cfg.cooldown_secs);
                if climate.state != ActuatorStatus::Off && settled {
                    outcome.commands.push(
                        Command::auto(ActuatorType::ClimateControl).with_state(ActuatorStatus::Off),
                    );
                }
            }
        }

        if climate.state == ActuatorStatus::Off
            && let Ok(humidity) = ctx.require_number(SensorType::Humidity)
            && humidity > cfg.humidity_alert_above
        {
            outcome.issues.push(Issue::new(
                NAME,
                Severity::Info,
                format!("High humidity ({humidity:.0}%). Consider ventilating the room."),
            ));
        }

        if temperature < cfg.safe_min || temperature > cfg.safe_max {
            outcome.issues.push(Issue::new(
                NAME,
                Severity::Error,
                format!(
                    "Temperature {temperature:.1}°C is outside the safe range [{}, {}]",
                    cfg.safe_min, cfg.safe_max
                ),
            ));
        }

        Ok(outcome)
    }
}
