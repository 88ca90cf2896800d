//! Notification Consolidator: deduplication, rate limiting and escalation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use roomhub_domain::notification::{Notification, Severity};
use roomhub_domain::time::{Timestamp, seconds};

use crate::rules::Issue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Quiet window per source rule.
    pub cooldown_secs: u32,
    /// Persistence after which severity goes up one level (and again at
    /// each further multiple).
    pub escalate_after_secs: u32,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 60,
            escalate_after_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    first_seen: Timestamp,
    last_seen: Timestamp,
    forwarded: Severity,
}

/// Per-source gate in front of the notification log.
#[derive(Debug)]
pub struct NotificationGate {
    config: NotificationConfig,
    entries: BTreeMap<&'static str, Entry>,
}

impl NotificationGate {
    #[must_use]
    pub fn new(config: NotificationConfig) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
        }
    }

    /// Decide whether `issue` becomes a notification.
    ///
    /// The first issue from a source is forwarded; repeats within the
    /// cooldown are suppressed and extend it. A repeat whose (possibly
    /// escalated) severity is above the last forwarded one always goes
    /// through.
    pub fn submit(&mut self, issue: &Issue, now: Timestamp) -> Option<Notification> {
        let cooldown = seconds(self.config.cooldown_secs);
        let escalate_after = self.config.escalate_after_secs;
        let severity = match self.entries.get_mut(issue.source_rule) {
            Some(entry) if now - entry.last_seen <= cooldown => {
                entry.last_seen = now;
                let escalated = issue.severity.escalate_by(escalation_steps(escalate_after, entry, now));
                if escalated <= entry.forwarded {
                    tracing::debug!(source_rule = issue.source_rule, "notification suppressed");
                    return None;
                }
                entry.forwarded = escalated;
                escalated
            }
            _ => {
                self.entries.insert(
                    issue.source_rule,
                    Entry {
                        first_seen: now,
                        last_seen: now,
                        forwarded: issue.severity,
                    },
                );
                issue.severity
            }
        };
        Some(Notification::new(
            issue.source_rule,
            severity,
            issue.message.clone(),
            now,
        ))
    }
}

/// Whole `escalate_after` periods the issue has persisted for.
fn escalation_steps(escalate_after: u32, entry: &Entry, now: Timestamp) -> u32 {
    let step = i64::from(escalate_after);
    if step == 0 {
        return 0;
    }
    let persisted = (now - entry.first_seen).num_seconds();
    u32::try_from(persisted / step).unwrap_or(u32::MAX)
}
