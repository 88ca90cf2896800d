//! Light–motion loop: lights follow occupancy and daylight.

use serde::{Deserialize, Serialize};

use roomhub_domain::actuator::{ActuatorStatus, ActuatorType};
use roomhub_domain::command::Command;
use roomhub_domain::error::RuleEvaluationError;
use roomhub_domain::sensor::SensorType;
use roomhub_domain::time::seconds;

use super::{PresenceTracker, Rule, RuleContext, RuleOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Seconds without motion before the light is switched off.
    pub idle_window_secs: u32,
    /// Below this ambient level an occupied room gets light.
    pub dark_below_lux: f64,
    /// Above this ambient level a lit room is switched off.
    pub bright_above_lux: f64,
    pub min_brightness: f64,
    pub max_brightness: f64,
    /// Brightness changes of at most this many points are ignored.
    pub deadband: f64,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            idle_window_secs: 300,
            dark_below_lux: 300.0,
            bright_above_lux: 600.0,
            min_brightness: 10.0,
            max_brightness: 100.0,
            deadband: 5.0,
        }
    }
}

impl LightConfig {
    /// Brightness inversely proportional to ambient light.
    #[must_use]
    pub fn brightness_for(&self, lux: f64) -> f64 {
        let darkness = 1.0 - (lux / self.dark_below_lux).clamp(0.0, 1.0);
        (self.max_brightness * darkness)
            .clamp(self.min_brightness, self.max_brightness)
            .round()
    }
}

pub struct LightMotionRule {
    config: LightConfig,
    presence: PresenceTracker,
}

impl LightMotionRule {
    #[must_use]
    pub fn new(config: LightConfig) -> Self {
        Self {
            config,
            presence: PresenceTracker::default(),
        }
    }
}

impl Rule for LightMotionRule {
    fn name(&self) -> &'static str {
        "light_motion"
    }

    fn inputs(&self) -> &'static [SensorType] {
        &[SensorType::Motion, SensorType::Light]
    }

    fn evaluate(&mut self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleEvaluationError> {
        let presence = self.presence.observe(ctx.reading(SensorType::Motion)?);
        let light = ctx.actuator(ActuatorType::SmartLight)?;
        let is_on = light.state == ActuatorStatus::On;
        let off = || {
            Command::auto(ActuatorType::SmartLight)
                .with_state(ActuatorStatus::Off)
                .with_param("brightness", 0.0)
        };

        let mut outcome = RuleOutcome::default();
        if presence.is_idle(ctx.now, seconds(self.config.idle_window_secs)) {
            if light.state != ActuatorStatus::Off {
                outcome.commands.push(off());
            }
            return Ok(outcome);
        }
        if !presence.is_present() {
            return Ok(outcome);
        }

        let lux = ctx.require_number(SensorType::Light)?;
        if lux < self.config.dark_below_lux {
            let target = self.config.brightness_for(lux);
            let within_deadband = light
                .number("brightness")
                .is_some_and(|current| (target - current).abs() <= self.config.deadband);
            if !(is_on && within_deadband) {
                outcome.commands.push(
                    Command::auto(ActuatorType::SmartLight)
                        .with_state(ActuatorStatus::On)
                        .with_param("brightness", target),
                );
            }
        } else if lux > self.config.bright_above_lux && is_on {
            outcome.commands.push(off());
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::Fixture;
    use roomhub_domain::actuator::ParamValue;
    use roomhub_domain::time::{Timestamp, now};

    fn run(rule: &mut LightMotionRule, fixture: &Fixture, at: Timestamp) -> RuleOutcome {
        rule.evaluate(&fixture.ctx(at)).unwrap()
    }

    #[test]
    fn should_compute_inverse_brightness_clamped() {
        let config = LightConfig::default();
        assert!((config.brightness_for(0.0) - 100.0).abs() < f64::EPSILON);
        assert!((config.brightness_for(150.0) - 50.0).abs() < f64::EPSILON);
        assert!((config.brightness_for(290.0) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_turn_light_on_when_dark_and_occupied() {
        let t0 = now();
        let mut fixture = Fixture::new(t0);
        fixture.reading(SensorType::Motion, true, t0);
        fixture.reading(SensorType::Light, 60.0, t0);
        let mut rule = LightMotionRule::new(LightConfig::default());

        let outcome = run(&mut rule, &fixture, t0);

        assert_eq!(
            outcome.commands,
            vec![
                Command::auto(ActuatorType::SmartLight)
                    .with_state(ActuatorStatus::On)
                    .with_param("brightness", 80.0)
            ]
        );
    }

    #[test]
    fn should_suppress_brightness_change_within_deadband() {
        let t0 = now();
        let mut fixture = Fixture::new(t0);
        fixture.reading(SensorType::Motion, true, t0);
        fixture.reading(SensorType::Light, 60.0, t0);
        let mut rule = LightMotionRule::new(LightConfig::default());
        let first = run(&mut rule, &fixture, t0);
        fixture.apply(&first.commands[0], t0);

        // 75 lux -> 75 %, within 5 points of 80 %
        fixture.reading(SensorType::Light, 75.0, t0 + seconds(5));
        assert!(run(&mut rule, &fixture, t0 + seconds(5)).commands.is_empty());

        // 120 lux -> 60 %, outside the deadband
        fixture.reading(SensorType::Light, 120.0, t0 + seconds(10));
        let outcome = run(&mut rule, &fixture, t0 + seconds(10));
        assert_eq!(outcome.commands.len(), 1);
        assert_eq!(
            outcome.commands[0].parameters.get("brightness"),
            Some(&ParamValue::Number(60.0))
        );
    }

    #[test]
    fn should_switch_off_after_idle_window_only() {
        let t0 = now();
        let mut fixture = Fixture::new(t0);
        fixture.apply(
            &Command::auto(ActuatorType::SmartLight)
                .with_state(ActuatorStatus::On)
                .with_param("brightness", 70.0),
            t0,
        );
        fixture.reading(SensorType::Motion, false, t0);
        fixture.reading(SensorType::Light, 100.0, t0);
        let mut rule = LightMotionRule::new(LightConfig::default());

        assert!(run(&mut rule, &fixture, t0 + seconds(299)).commands.is_empty());
        let outcome = run(&mut rule, &fixture, t0 + seconds(300));
        assert_eq!(outcome.commands.len(), 1);
        assert_eq!(outcome.commands[0].state, Some(ActuatorStatus::Off));
    }

    #[test]
    fn should_switch_off_in_bright_room() {
        let t0 = now();
        let mut fixture = Fixture::new(t0);
        fixture.apply(
            &Command::auto(ActuatorType::SmartLight).with_state(ActuatorStatus::On),
            t0,
        );
        fixture.reading(SensorType::Motion, true, t0);
        fixture.reading(SensorType::Light, 800.0, t0);
        let mut rule = LightMotionRule::new(LightConfig::default());

        let outcome = run(&mut rule, &fixture, t0);

        assert_eq!(outcome.commands[0].state, Some(ActuatorStatus::Off));
    }

    #[test]
    fn should_hold_between_thresholds() {
        let t0 = now();
        let mut fixture = Fixture::new(t0);
        fixture.reading(SensorType::Motion, true, t0);
        fixture.reading(SensorType::Light, 450.0, t0);
        let mut rule = LightMotionRule::new(LightConfig::default());

        assert!(run(&mut rule, &fixture, t0).is_empty());
    }

    #[test]
    fn should_fail_without_motion_reading() {
        let t0 = now();
        let mut fixture = Fixture::new(t0);
        fixture.reading(SensorType::Light, 50.0, t0);
        let mut rule = LightMotionRule::new(LightConfig::default());

        assert_eq!(
            rule.evaluate(&fixture.ctx(t0)),
            Err(RuleEvaluationError::MissingReading(SensorType::Motion))
        );
    }
}
