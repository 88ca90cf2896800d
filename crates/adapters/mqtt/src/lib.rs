//! # roomhub-adapter-mqtt
//!
//! MQTT adapter: the hub's [`BusTransport`](roomhub_app::ports::BusTransport)
//! on top of `rumqttc`.
//!
//! ## Responsibilities
//! - Connect to the broker and keep the connection alive
//! - Reconnect with exponential backoff (reset on every CONNACK)
//! - Re-issue every subscription after a reconnect
//! - Push inbound publishes into the hub's [`Inbox`](roomhub_app::bus::Inbox)
//!   and report connection changes through it
//!
//! ## Dependency rule
//! Same as other adapters: depends on `roomhub-app` and `roomhub-domain`.

mod backoff;
mod config;
mod error;
mod transport;

pub use backoff::Backoff;
pub use config::MqttConfig;
pub use error::MqttError;
pub use transport::MqttTransport;
