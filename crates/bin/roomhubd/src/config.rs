//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `roomhub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use serde::Deserialize;

use roomhub_adapter_mqtt::MqttConfig;
use roomhub_app::config::HubConfig;

/// Top-level configuration.
///
/// Hub settings (`base_topic`, `[bus]`, `[store]`, `[engine]`,
/// `[notifications]`, `[rules.*]`, `[comfort.*]`) sit at the top level of
/// the file next to the daemon's own sections.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Broker connection.
    pub mqtt: MqttConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    #[serde(flatten)]
    pub hub: HubConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `roomhub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is inconsistent.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("roomhub.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("ROOMHUB_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("ROOMHUB_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = var("ROOMHUB_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("ROOMHUB_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(port) = var("ROOMHUB_MQTT_PORT").and_then(|val| val.parse().ok()) {
            self.mqtt.broker_port = port;
        }
        if let Some(enabled) = var("ROOMHUB_MQTT_ENABLED").and_then(|val| val.parse().ok()) {
            self.mqtt.enabled = enabled;
        }
        if let Some(val) = var("ROOMHUB_BASE_TOPIC") {
            self.hub.base_topic = val;
        }
        if let Some(val) = var("ROOMHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.mqtt.enabled {
            if self.mqtt.broker_host.is_empty() {
                return Err(ConfigError::Validation(
                    "mqtt.broker_host must be set when mqtt is enabled".to_string(),
                ));
            }
            if self.mqtt.reconnect_initial_ms > self.mqtt.reconnect_max_ms {
                return Err(ConfigError::Validation(
                    "mqtt.reconnect_initial_ms must not exceed reconnect_max_ms".to_string(),
                ));
            }
        }
        self.hub.validate().map_err(ConfigError::Validation)
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "roomhubd=info,roomhub_app=info,roomhub_adapter_mqtt=info,tower_http=debug"
                .to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overridden(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).cloned());
        config
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert!(config.mqtt.enabled);
        assert_eq!(config.mqtt.broker_port, 1883);
        assert_eq!(config.hub.base_topic, "room");
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.hub.engine.tick_interval_secs, 5);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            base_topic = 'lab'

            [server]
            host = '127.0.0.1'
            port = 9090

            [mqtt]
            enabled = false
            broker_host = 'broker.local'

            [logging]
            filter = 'debug'

            [engine]
            tick_interval_secs = 2

            [notifications]
            cooldown_secs = 120

            [rules.climate]
            target = 21.0
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert!(!config.mqtt.enabled);
        assert_eq!(config.mqtt.broker_host, "broker.local");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.hub.base_topic, "lab");
        assert_eq!(config.hub.engine.tick_interval_secs, 2);
        assert_eq!(config.hub.notifications.cooldown_secs, 120);
        assert!((config.hub.rules.climate.target - 21.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_inconsistent_hub_settings() {
        let mut config = Config::default();
        config.hub.store.history_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_inverted_reconnect_delays() {
        let mut config = Config::default();
        config.mqtt.reconnect_initial_ms = 60_000;
        assert!(config.validate().is_err());
        config.mqtt.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_apply_bind_override() {
        let config = overridden(&[("ROOMHUB_BIND", "127.0.0.1:8080")]);
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn should_apply_mqtt_overrides() {
        let config = overridden(&[
            ("ROOMHUB_MQTT_HOST", "10.0.0.2"),
            ("ROOMHUB_MQTT_PORT", "8883"),
            ("ROOMHUB_MQTT_ENABLED", "false"),
        ]);
        assert_eq!(config.mqtt.broker_host, "10.0.0.2");
        assert_eq!(config.mqtt.broker_port, 8883);
        assert!(!config.mqtt.enabled);
    }

    #[test]
    fn should_ignore_unparsable_port_override() {
        let config = overridden(&[("ROOMHUB_PORT", "http")]);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_prefer_rust_log_over_roomhub_log() {
        let config = overridden(&[("ROOMHUB_LOG", "info"), ("RUST_LOG", "trace")]);
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_format_bind_addr() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }
}
