//! # roomhub-app
//!
//! Application layer: the Coordination Hub use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `BusTransport`: publish/subscribe transport (MQTT, in-memory, …)
//!   - `CommandSink`: where the rule engine sends commands and notifications
//! - Provide the hub's components:
//!   - `MessageBus`: bounded inbound queues, topic subscriptions, publish deadlines
//!   - `StateStore`: latest + bounded history per sensor, actuator states, notifications
//!   - `ControlEngine` + `rules`: closed-loop feedback rules with hysteresis
//!   - `NotificationGate`: deduplication, rate limiting, severity escalation
//!   - `CommandDispatcher`: per-actuator serialized command dispatch
//!   - `Fanout`: realtime observer sessions and analytics queries
//!   - `Hub`: wires everything into the ingest pipeline and owns shutdown
//!
//! ## Dependency rule
//! Depends on `roomhub-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod event_bus;
pub mod fanout;
pub mod hub;
pub mod notifier;
pub mod ports;
pub mod rules;
mod shutdown;
pub mod state_store;
