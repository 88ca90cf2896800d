//! Control Rule Engine.
//!
//! Runs the rules against a consistent snapshot, dispatches what they decide
//! (unless the target actuator is under manual control), keeps the current
//! issues of every rule and turns them into notifications. When more than one
//! issue is current the engine raises a single consolidated notification
//! instead of one per issue.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use roomhub_domain::actuator::{ActuatorStatus, ActuatorType};
use roomhub_domain::command::Command;
use roomhub_domain::notification::{Notification, Severity};
use roomhub_domain::sensor::SensorType;
use roomhub_domain::time::Timestamp;

use crate::notifier::{NotificationConfig, NotificationGate};
use crate::ports::{CommandSink, DispatchOutcome};
use crate::rules::{Issue, Rule, RuleContext};
use crate::state_store::StateStore;

/// Source name of consolidated notifications.
pub const CONSOLIDATION_SOURCE: &str = "comfort_consolidation";
/// Source name of dispatch failure notifications.
pub const DISPATCH_SOURCE: &str = "dispatch";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Period of the time-driven evaluation (idle windows, cooldowns, reminders).
    pub tick_interval_secs: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 5,
        }
    }
}

/// Why a cycle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A reading of this type became current: only rules reading it run.
    Sensor(SensorType),
    /// An actuator was changed from outside the engine.
    Actuator(ActuatorType),
    /// Periodic evaluation of every rule.
    Tick,
}

impl Trigger {
    fn selects(self, rule: &dyn Rule) -> bool {
        match self {
            Self::Sensor(sensor_type) => rule.inputs().contains(&sensor_type),
            Self::Actuator(_) | Self::Tick => true,
        }
    }
}

/// What happened during one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub evaluated: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
    pub dispatched: Vec<Command>,
    /// Commands not sent because the actuator is under manual control.
    pub withheld: Vec<Command>,
    pub notifications: Vec<Notification>,
}

struct EngineState {
    rules: Vec<Box<dyn Rule>>,
    gate: NotificationGate,
    issues: BTreeMap<&'static str, Vec<Issue>>,
}

pub struct ControlEngine<S> {
    store: Arc<StateStore>,
    sink: S,
    history_depth: usize,
    state: Mutex<EngineState>,
}

impl<S: CommandSink> ControlEngine<S> {
    #[must_use]
    pub fn new(
        store: Arc<StateStore>,
        sink: S,
        rules: Vec<Box<dyn Rule>>,
        notifications: NotificationConfig,
    ) -> Self {
        let history_depth = rules.iter().map(|r| r.history_depth()).max().unwrap_or(0);
        Self {
            store,
            sink,
            history_depth,
            state: Mutex::new(EngineState {
                rules,
                gate: NotificationGate::new(notifications),
                issues: BTreeMap::new(),
            }),
        }
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run one evaluation cycle. Cycles never overlap.
    pub async fn evaluate(&self, trigger: Trigger, now: Timestamp) -> CycleReport {
        let mut guard = self.state.lock().await;
        let EngineState {
            rules,
            gate,
            issues,
        } = &mut *guard;
        let (snapshot, history) = self.store.snapshot_with_history(self.history_depth);
        let ctx = RuleContext {
            snapshot: &snapshot,
            history: &history,
            now,
        };

        let mut report = CycleReport::default();
        let mut commands = Vec::new();
        let mut notices = Vec::new();
        let mut fresh_issues = false;

        for rule in rules.iter_mut() {
            if !trigger.selects(&**rule) {
                continue;
            }
            let name = rule.name();
            match rule.evaluate(&ctx) {
                Ok(outcome) => {
                    report.evaluated.push(name);
                    if !outcome.is_empty() {
                        tracing::debug!(
                            rule = name,
                            commands = outcome.commands.len(),
                            issues = outcome.issues.len(),
                            notices = outcome.notices.len(),
                            "rule decided"
                        );
                    }
                    for session in outcome.sessions {
                        self.store.record_session(session);
                    }
                    commands.extend(outcome.commands);
                    notices.extend(outcome.notices);
                    fresh_issues |= !outcome.issues.is_empty();
                    issues.insert(name, outcome.issues);
                }
                Err(err) => {
                    tracing::warn!(rule = name, %err, "rule skipped this cycle");
                    // an unevaluated rule has no current issues
                    issues.remove(name);
                    report.skipped.push(name);
                }
            }
        }

        let issue_count: usize = issues.values().map(Vec::len).sum();
        let alarm = alarm_status(issue_count);
        if snapshot
            .actuator(ActuatorType::NotificationSystem)
            .is_some_and(|s| s.state != alarm)
        {
            let active = u32::try_from(issue_count).unwrap_or(u32::MAX);
            commands.push(
                Command::auto(ActuatorType::NotificationSystem)
                    .with_state(alarm)
                    .with_param("active_issues", f64::from(active)),
            );
        }

        for command in commands {
            let manual = snapshot
                .actuator(command.actuator_type)
                .is_some_and(|s| !s.auto_mode);
            if manual {
                tracing::info!(
                    actuator = %command.actuator_type,
                    state = ?command.state,
                    parameters = ?command.parameters,
                    "manual override active, would have dispatched"
                );
                report.withheld.push(command);
                continue;
            }
            let actuator_type = command.actuator_type;
            match self.sink.dispatch_command(command.clone(), now).await {
                Ok(DispatchOutcome::Applied(_)) => report.dispatched.push(command),
                Ok(DispatchOutcome::Overridden) => report.withheld.push(command),
                Ok(DispatchOutcome::Unchanged) => {}
                Err(err) => {
                    let failure = Issue::new(
                        DISPATCH_SOURCE,
                        Severity::Error,
                        format!("Failed to command {actuator_type}: {err}"),
                    );
                    if let Some(n) = gate.submit(&failure, now) {
                        report.notifications.push(n);
                    }
                }
            }
        }

        for notice in notices {
            report.notifications.push(Notification::new(
                notice.source_rule,
                notice.severity,
                notice.message,
                now,
            ));
        }

        if fresh_issues {
            let current: Vec<&Issue> = issues.values().flatten().collect();
            let issue = match current.as_slice() {
                [single] => Some((*single).clone()),
                [] => None,
                many => Some(consolidate(many)),
            };
            if let Some(n) = issue.and_then(|issue| gate.submit(&issue, now)) {
                report.notifications.push(n);
            }
        }

        for notification in &report.notifications {
            self.sink.dispatch_notification(notification.clone()).await;
        }

        tracing::debug!(
            ?trigger,
            evaluated = ?report.evaluated,
            dispatched = report.dispatched.len(),
            withheld = report.withheld.len(),
            notifications = report.notifications.len(),
            "evaluation cycle complete"
        );
        report
    }

    /// Route an out-of-band issue through the consolidator.
    pub async fn notify(&self, issue: &Issue, now: Timestamp) -> Option<Notification> {
        let notification = self.state.lock().await.gate.submit(issue, now)?;
        self.sink.dispatch_notification(notification.clone()).await;
        Some(notification)
    }
}

fn alarm_status(issue_count: usize) -> ActuatorStatus {
    match issue_count {
        0 => ActuatorStatus::Off,
        1 => ActuatorStatus::On,
        _ => ActuatorStatus::Alert,
    }
}

fn consolidate(issues: &[&Issue]) -> Issue {
    let severity = issues
        .iter()
        .map(|i| i.severity)
        .max()
        .unwrap_or(Severity::Info);
    let lines: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
    Issue::new(
        CONSOLIDATION_SOURCE,
        severity,
        format!("Multiple comfort issues detected:\n{}", lines.join("\n")),
    )
}
