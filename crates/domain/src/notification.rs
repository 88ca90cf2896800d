//! Notifications: user-facing messages raised by control rules.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::NotificationId;
use crate::time::Timestamp;

/// How urgent a notification is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Alert,
    Error,
}

impl Severity {
    /// The next level up, saturating at [`Error`](Self::Error).
    #[must_use]
    pub fn escalate(self) -> Self {
        match self {
            Self::Info => Self::Alert,
            Self::Alert | Self::Error => Self::Error,
        }
    }

    /// Escalate `steps` times.
    #[must_use]
    pub fn escalate_by(self, steps: u32) -> Self {
        (0..steps.min(2)).fold(self, |s, _| s.escalate())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::Alert => f.write_str("alert"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// A message in the hub's append-only notification log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub severity: Severity,
    pub timestamp: Timestamp,
    /// Name of the rule (or subsystem) that raised it; the deduplication key.
    pub source_rule: String,
}

impl Notification {
    #[must_use]
    pub fn new(
        source_rule: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            message: message.into(),
            severity,
            timestamp,
            source_rule: source_rule.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_order_severities() {
        assert!(Severity::Info < Severity::Alert);
        assert!(Severity::Alert < Severity::Error);
    }

    #[test]
    fn should_saturate_escalation_at_error() {
        assert_eq!(Severity::Info.escalate(), Severity::Alert);
        assert_eq!(Severity::Error.escalate(), Severity::Error);
        assert_eq!(Severity::Info.escalate_by(7), Severity::Error);
        assert_eq!(Severity::Alert.escalate_by(0), Severity::Alert);
    }

    #[test]
    fn should_serialize_severity_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Alert).unwrap(), "\"alert\"");
    }
}
