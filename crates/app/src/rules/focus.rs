//! Noise–focus loop and study session tracking.

use serde::{Deserialize, Serialize};

use roomhub_domain::actuator::{ActuatorStatus, ActuatorType};
use roomhub_domain::command::Command;
use roomhub_domain::comfort::StudySession;
use roomhub_domain::error::RuleEvaluationError;
use roomhub_domain::notification::Severity;
use roomhub_domain::sensor::SensorType;
use roomhub_domain::time::{Timestamp, seconds};

use super::{Issue, Presence, PresenceTracker, Rule, RuleContext, RuleOutcome};

const NAME: &str = "focus";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Rolling average above this level (dB) counts as noisy.
    pub noise_threshold: f64,
    /// Number of recent noise readings in the rolling average.
    pub noise_window: usize,
    /// Seconds the average must stay above the threshold.
    pub sustain_secs: u32,
    /// A single reading above this level (dB) is reported.
    pub noise_spike_above: f64,
    pub break_interval_secs: u32,
    /// Seconds without motion that end a session.
    pub idle_window_secs: u32,
    /// Sessions must last longer than this to be announced and logged.
    pub min_session_secs: u32,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            noise_threshold: 50.0,
            noise_window: 10,
            sustain_secs: 30,
            noise_spike_above: 70.0,
            break_interval_secs: 45 * 60,
            idle_window_secs: 300,
            min_session_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Session {
    started: Timestamp,
    last_reminder: Timestamp,
}

pub struct FocusRule {
    config: FocusConfig,
    presence: PresenceTracker,
    session: Option<Session>,
    noisy_since: Option<Timestamp>,
    last_spike: Option<Timestamp>,
}

impl FocusRule {
    #[must_use]
    pub fn new(config: FocusConfig) -> Self {
        Self {
            config,
            presence: PresenceTracker::default(),
            session: None,
            noisy_since: None,
            last_spike: None,
        }
    }

    fn track_session(&mut self, presence: Presence, now: Timestamp, outcome: &mut RuleOutcome) {
        match self.session {
            None if presence.is_present() => {
                self.session = Some(Session {
                    started: now,
                    last_reminder: now,
                });
                outcome.notices.push(Issue::new(
                    NAME,
                    Severity::Info,
                    "Study session started. Good luck!",
                ));
            }
            Some(session) if presence.is_idle(now, seconds(self.config.idle_window_secs)) => {
                self.session = None;
                if now - session.started <= seconds(self.config.min_session_secs) {
                    tracing::debug!(started = %session.started, "short study session not logged");
                    return;
                }
                let finished = StudySession::new(session.started, now);
                outcome.notices.push(Issue::new(
                    NAME,
                    Severity::Info,
                    format!(
                        "Study session ended. Duration: {} minutes.",
                        finished.duration_minutes
                    ),
                ));
                outcome.sessions.push(finished);
            }
            _ => {}
        }

        if let Some(session) = self.session.as_mut()
            && now - session.last_reminder >= seconds(self.config.break_interval_secs)
        {
            session.last_reminder = now;
            outcome.notices.push(Issue::new(
                NAME,
                Severity::Info,
                format!(
                    "Time for a break! You've been studying for {} minutes.",
                    (now - session.started).num_minutes()
                ),
            ));
        }
    }
}

impl Rule for FocusRule {
    fn name(&self) -> &'static str {
        NAME
    }

    fn inputs(&self) -> &'static [SensorType] {
        &[SensorType::Noise, SensorType::Motion]
    }

    fn history_depth(&self) -> usize {
        self.config.noise_window
    }

    fn evaluate(&mut self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleEvaluationError> {
        let reading = ctx.reading(SensorType::Noise)?;
        let noise = ctx.require_number(SensorType::Noise)?;
        let focus = ctx.actuator(ActuatorType::FocusMode)?;
        let mut outcome = RuleOutcome::default();

        if let Ok(motion) = ctx.reading(SensorType::Motion) {
            let presence = self.presence.observe(motion);
            self.track_session(presence, ctx.now, &mut outcome);
        }

        let window = ctx.recent_numbers(SensorType::Noise, self.config.noise_window);
        #[allow(clippy::cast_precision_loss)]
        let average = if window.is_empty() {
            noise
        } else {
            window.iter().sum::<f64>() / window.len() as f64
        };

        let sustained = if average > self.config.noise_threshold {
            let since = *self.noisy_since.get_or_insert(reading.timestamp);
            ctx.now - since >= seconds(self.config.sustain_secs)
        } else {
            self.noisy_since = None;
            false
        };

        let desired = if sustained {
            ActuatorStatus::Alert
        } else if self.session.is_some() {
            ActuatorStatus::Active
        } else {
            ActuatorStatus::Off
        };
        if focus.state != desired {
            outcome
                .commands
                .push(Command::auto(ActuatorType::FocusMode).with_state(desired));
        }

        if sustained {
            outcome.issues.push(Issue::new(
                NAME,
                Severity::Alert,
                format!("Sustained noise ({average:.0} dB average) is disrupting focus."),
            ));
        }
        if noise > self.config.noise_spike_above && self.last_spike != Some(reading.timestamp) {
            self.last_spike = Some(reading.timestamp);
            outcome.issues.push(Issue::new(
                NAME,
                Severity::Alert,
                format!("Noise spike detected: {noise:.0} dB"),
            ));
        }

        Ok(outcome)
    }
}
