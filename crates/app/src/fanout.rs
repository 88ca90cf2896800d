//! Realtime Fanout: observer sessions and on-demand analytics.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use roomhub_domain::comfort::{
    ComfortBands, StudySession, TREND_WINDOW, Trend, analyze_trends, compute_score,
};
use roomhub_domain::event::HubEvent;
use roomhub_domain::id::ObserverId;
use roomhub_domain::sensor::SensorType;
use roomhub_domain::snapshot::Snapshot;

use crate::shutdown;
use crate::state_store::StateStore;

/// Result of an analytics query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub comfort_score: f64,
    pub recommendations: Vec<String>,
    pub trends: BTreeMap<SensorType, Trend>,
    /// Applied readings outside their comfort band, per sensor.
    pub comfort_violations: BTreeMap<SensorType, u64>,
    /// Most recent finished study sessions, oldest-first.
    pub study_sessions: Vec<StudySession>,
}

/// Hands out observer sessions over the store's delta stream.
pub struct Fanout {
    store: Arc<StateStore>,
    bands: ComfortBands,
    shutdown: watch::Sender<bool>,
}

impl Fanout {
    #[must_use]
    pub fn new(store: Arc<StateStore>, bands: ComfortBands) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            bands,
            shutdown,
        }
    }

    /// Open a session: one initial snapshot, then every later delta.
    #[must_use]
    pub fn connect(&self) -> ObserverSession {
        let (snapshot, rx) = self.store.connect_observer();
        let session = ObserverSession {
            id: ObserverId::new(),
            initial: Some(snapshot),
            rx,
            shutdown: self.shutdown.subscribe(),
            lagged: 0,
        };
        tracing::info!(observer = %session.id, observers = self.observer_count(), "observer connected");
        session
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// Recompute the comfort score and trends against current state.
    #[must_use]
    pub fn analytics(&self) -> AnalyticsReport {
        let (snapshot, history) = self.store.snapshot_with_history(TREND_WINDOW);
        let (comfort_violations, study_sessions) = self.store.comfort_log();
        let score = compute_score(&snapshot, &self.bands);
        AnalyticsReport {
            comfort_score: (score.value * 10.0).round() / 10.0,
            recommendations: score.recommendations,
            trends: analyze_trends(&history),
            comfort_violations,
            study_sessions,
        }
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.store.observer_count()
    }

    /// End every session; their next wait returns `None`.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }
}

/// One connected observer.
pub struct ObserverSession {
    id: ObserverId,
    initial: Option<Snapshot>,
    rx: broadcast::Receiver<HubEvent>,
    shutdown: watch::Receiver<bool>,
    lagged: u64,
}

impl ObserverSession {
    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// The snapshot taken at connect time. `Some` exactly once.
    pub fn take_initial(&mut self) -> Option<Snapshot> {
        self.initial.take()
    }

    /// Deltas this observer lost because it fell behind.
    #[must_use]
    pub fn lagged(&self) -> u64 {
        self.lagged
    }

    /// Wait for the next delta. `None` once the hub shuts down.
    ///
    /// A slow observer skips the deltas it missed; the count is logged and
    /// kept in [`lagged`](Self::lagged).
    pub async fn next_event(&mut self) -> Option<HubEvent> {
        loop {
            tokio::select! {
                biased;
                () = shutdown::requested(&mut self.shutdown) => return None,
                received = self.rx.recv() => match received {
                    Ok(event) => return Some(event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        self.lagged += missed;
                        tracing::warn!(observer = %self.id, missed, "observer lagging, oldest deltas dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }
}

impl Drop for ObserverSession {
    fn drop(&mut self) {
        tracing::info!(observer = %self.id, lagged = self.lagged, "observer disconnected");
    }
}
