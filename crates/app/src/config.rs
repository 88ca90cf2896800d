//! Hub-wide configuration.
//!
//! Every field has a default so hosts can deserialize partial files.

use serde::{Deserialize, Serialize};

use roomhub_domain::comfort::{ComfortBands, MetricBand};
use roomhub_domain::topic::TopicScheme;

use crate::bus::BusConfig;
use crate::engine::EngineConfig;
use crate::notifier::NotificationConfig;
use crate::rules::RulesConfig;
use crate::state_store::StoreConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Prefix of every topic (`{base}/sensors/...`).
    pub base_topic: String,
    pub bus: BusConfig,
    pub store: StoreConfig,
    pub engine: EngineConfig,
    pub notifications: NotificationConfig,
    pub rules: RulesConfig,
    pub comfort: ComfortBands,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base_topic: "room".to_string(),
            bus: BusConfig::default(),
            store: StoreConfig::default(),
            engine: EngineConfig::default(),
            notifications: NotificationConfig::default(),
            rules: RulesConfig::default(),
            comfort: ComfortBands::default(),
        }
    }
}

impl HubConfig {
    #[must_use]
    pub fn topics(&self) -> TopicScheme {
        TopicScheme::new(self.base_topic.clone())
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_topic.trim_matches('/').is_empty() {
            return Err("base_topic must not be empty".to_string());
        }
        if self.bus.telemetry_queue_capacity == 0 || self.bus.command_queue_capacity == 0 {
            return Err("bus queue capacities must be non-zero".to_string());
        }
        if self.bus.operation_timeout_ms == 0 {
            return Err("bus.operation_timeout_ms must be non-zero".to_string());
        }
        if self.store.history_capacity == 0 || self.store.event_capacity == 0 {
            return Err("store capacities must be non-zero".to_string());
        }
        if self.engine.tick_interval_secs == 0 {
            return Err("engine.tick_interval_secs must be non-zero".to_string());
        }

        let light = &self.rules.light;
        if light.dark_below_lux <= 0.0 || light.dark_below_lux > light.bright_above_lux {
            return Err("rules.light needs 0 < dark_below_lux <= bright_above_lux".to_string());
        }
        if light.min_brightness > light.max_brightness {
            return Err("rules.light.min_brightness exceeds max_brightness".to_string());
        }
        let climate = &self.rules.climate;
        if !(climate.band_min <= climate.target && climate.target <= climate.band_max) {
            return Err("rules.climate.target must lie inside its band".to_string());
        }
        if self.rules.focus.noise_window == 0 {
            return Err("rules.focus.noise_window must be non-zero".to_string());
        }

        for (name, band) in [
            ("temperature", &self.comfort.temperature),
            ("humidity", &self.comfort.humidity),
            ("light", &self.comfort.light),
            ("noise", &self.comfort.noise),
        ] {
            check_band(name, band)?;
        }
        Ok(())
    }
}

fn check_band(name: &str, band: &MetricBand) -> Result<(), String> {
    if band.min > band.max {
        return Err(format!("comfort.{name}: min exceeds max"));
    }
    if band.slope < 0.0 || band.cap < 0.0 || band.weight < 0.0 {
        return Err(format!("comfort.{name}: slope, cap and weight must be non-negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_accept_defaults() {
        assert_eq!(HubConfig::default().validate(), Ok(()));
    }

    #[test]
    fn should_reject_inverted_light_thresholds() {
        let mut config = HubConfig::default();
        config.rules.light.dark_below_lux = 800.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_inverted_comfort_band() {
        let mut config = HubConfig::default();
        config.comfort.noise = MetricBand::new(50.0, 10.0, 1.0, 10.0);
        assert!(config.validate().unwrap_err().contains("comfort.noise"));
    }

    #[test]
    fn should_build_topic_scheme_from_base() {
        let config = HubConfig {
            base_topic: "lab/".to_string(),
            ..HubConfig::default()
        };
        assert_eq!(config.topics().sensor(roomhub_domain::sensor::SensorType::Noise), "lab/sensors/noise");
    }
}
