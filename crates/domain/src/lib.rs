//! # roomhub-domain
//!
//! Pure domain model for the roomhub coordination hub.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **sensor readings** (temperature, humidity, light, noise, motion)
//! - Define **actuator states** and the **commands** that mutate them
//! - Define **notifications**, **snapshots** and **hub events** (deltas)
//! - Define the MQTT **topic scheme** the hub speaks
//! - Fixed-capacity **ring buffers** backing every bounded log
//! - **Comfort analytics**: score, recommendations, trends
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod actuator;
pub mod comfort;
pub mod command;
pub mod event;
pub mod notification;
pub mod ring;
pub mod sensor;
pub mod snapshot;
pub mod topic;
