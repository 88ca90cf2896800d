//! State Store: the single source of truth for current hub state.
//!
//! One lock guards every reading, actuator and notification. Each committed
//! change is assigned the next sequence number and broadcast while the lock
//! is still held, so subscribers observe changes in commit order.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use roomhub_domain::actuator::{ActuatorState, ActuatorType};
use roomhub_domain::command::Command;
use roomhub_domain::comfort::StudySession;
use roomhub_domain::error::{HubError, StaleReadingError, UnknownEntityError};
use roomhub_domain::event::{HubEvent, HubEventKind};
use roomhub_domain::notification::Notification;
use roomhub_domain::ring::RingBuffer;
use roomhub_domain::sensor::{SensorReading, SensorType};
use roomhub_domain::snapshot::Snapshot;
use roomhub_domain::time::{Timestamp, now};

use crate::event_bus::InProcessEventBus;

/// Capacities of the bounded collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Readings kept per sensor type.
    pub history_capacity: usize,
    pub notification_capacity: usize,
    /// Finished study sessions kept for analytics.
    pub session_capacity: usize,
    /// Per-observer delta backlog before the oldest deltas are dropped.
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            notification_capacity: 50,
            session_capacity: 10,
            event_capacity: 256,
        }
    }
}

/// Result of [`StateStore::update_sensor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorUpdate {
    /// The reading became current.
    Applied,
    /// The exact reading is already current.
    Duplicate,
    /// Older than the current reading: kept in history only.
    Stale(StaleReadingError),
}

struct Inner {
    seq: u64,
    bus_connected: bool,
    sensors: BTreeMap<SensorType, SensorReading>,
    history: BTreeMap<SensorType, RingBuffer<SensorReading>>,
    actuators: BTreeMap<ActuatorType, ActuatorState>,
    notifications: RingBuffer<Notification>,
    violations: BTreeMap<SensorType, u64>,
    sessions: RingBuffer<StudySession>,
}

impl Inner {
    fn commit(&mut self, events: &InProcessEventBus, at: Timestamp, kind: HubEventKind) {
        self.seq += 1;
        events.publish(HubEvent::new(self.seq, at, kind));
    }

    fn snapshot(&self, taken_at: Timestamp) -> Snapshot {
        Snapshot {
            seq: self.seq,
            taken_at,
            bus_connected: self.bus_connected,
            sensors: self.sensors.clone(),
            actuators: self.actuators.clone(),
            notifications: self.notifications.iter().cloned().collect(),
        }
    }
}

/// Owned, lock-protected hub state.
pub struct StateStore {
    inner: Mutex<Inner>,
    events: InProcessEventBus,
    history_capacity: usize,
}

impl StateStore {
    /// A store with every actuator in its boot state.
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        let at = now();
        Self {
            inner: Mutex::new(Inner {
                seq: 0,
                bus_connected: false,
                sensors: BTreeMap::new(),
                history: BTreeMap::new(),
                actuators: ActuatorType::ALL
                    .into_iter()
                    .map(|t| (t, ActuatorState::initial(t, at)))
                    .collect(),
                notifications: RingBuffer::new(config.notification_capacity),
                violations: BTreeMap::new(),
                sessions: RingBuffer::new(config.session_capacity),
            }),
            events: InProcessEventBus::new(config.event_capacity),
            history_capacity: config.history_capacity,
        }
    }

    /// Record a reading.
    ///
    /// The reading always lands in history (ordered by timestamp). It only
    /// becomes current when it is at least as new as the current one.
    pub fn update_sensor(&self, reading: SensorReading) -> SensorUpdate {
        let mut inner = self.inner.lock();
        let sensor_type = reading.sensor_type;

        if let Some(current) = inner.sensors.get(&sensor_type) {
            if *current == reading {
                return SensorUpdate::Duplicate;
            }
            if reading.timestamp < current.timestamp {
                let stale = StaleReadingError {
                    sensor_type,
                    timestamp: reading.timestamp,
                    current: current.timestamp,
                };
                self.push_history(&mut inner, reading);
                tracing::debug!(%stale, "stale reading kept in history only");
                return SensorUpdate::Stale(stale);
            }
        }

        self.push_history(&mut inner, reading.clone());
        inner.sensors.insert(sensor_type, reading.clone());
        let at = reading.timestamp;
        inner.commit(&self.events, at, HubEventKind::SensorUpdated(reading));
        SensorUpdate::Applied
    }

    fn push_history(&self, inner: &mut Inner, reading: SensorReading) {
        inner
            .history
            .entry(reading.sensor_type)
            .or_insert_with(|| RingBuffer::new(self.history_capacity))
            .insert_ordered_by_key(reading, |r| r.timestamp);
    }

    /// Merge `command` into the actuator's state.
    ///
    /// Returns the new state, or `None` when nothing changed (no event is
    /// emitted in that case).
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownEntity`] if the actuator has no state.
    pub fn update_actuator(
        &self,
        command: &Command,
        at: Timestamp,
    ) -> Result<Option<ActuatorState>, HubError> {
        let mut inner = self.inner.lock();
        let state = inner
            .actuators
            .get_mut(&command.actuator_type)
            .ok_or_else(|| UnknownEntityError::new("actuator", command.actuator_type.as_str()))?;
        if !state.apply(command, at) {
            return Ok(None);
        }
        let state = state.clone();
        inner.commit(&self.events, at, HubEventKind::ActuatorUpdated(state.clone()));
        Ok(Some(state))
    }

    /// Append to the notification log, evicting the oldest when full.
    pub fn push_notification(&self, notification: Notification) {
        let mut inner = self.inner.lock();
        let at = notification.timestamp;
        inner.notifications.push(notification.clone());
        inner.commit(
            &self.events,
            at,
            HubEventKind::NotificationRaised(notification),
        );
    }

    /// Count one out-of-comfort-band reading.
    pub fn record_violation(&self, sensor_type: SensorType) {
        *self.inner.lock().violations.entry(sensor_type).or_default() += 1;
    }

    /// Append a finished study session, evicting the oldest when full.
    pub fn record_session(&self, session: StudySession) {
        self.inner.lock().sessions.push(session);
    }

    /// Violation counters per sensor and recent study sessions, oldest-first.
    #[must_use]
    pub fn comfort_log(&self) -> (BTreeMap<SensorType, u64>, Vec<StudySession>) {
        let inner = self.inner.lock();
        (inner.violations.clone(), inner.sessions.iter().cloned().collect())
    }

    /// Record the bus connection state. Emits an event on change only.
    pub fn set_bus_connected(&self, connected: bool) -> bool {
        let mut inner = self.inner.lock();
        if inner.bus_connected == connected {
            return false;
        }
        inner.bus_connected = connected;
        inner.commit(
            &self.events,
            now(),
            HubEventKind::BusStatusChanged { connected },
        );
        true
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().snapshot(now())
    }

    /// A snapshot plus the last `limit` readings per sensor, read atomically.
    #[must_use]
    pub fn snapshot_with_history(
        &self,
        limit: usize,
    ) -> (Snapshot, BTreeMap<SensorType, Vec<SensorReading>>) {
        let inner = self.inner.lock();
        let history = inner
            .history
            .iter()
            .map(|(t, ring)| (*t, ring.latest(limit)))
            .collect();
        (inner.snapshot(now()), history)
    }

    /// The last `limit` readings for a type, oldest-first.
    #[must_use]
    pub fn history(&self, sensor_type: SensorType, limit: usize) -> Vec<SensorReading> {
        self.inner
            .lock()
            .history
            .get(&sensor_type)
            .map(|ring| ring.latest(limit))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn actuator(&self, actuator_type: ActuatorType) -> Option<ActuatorState> {
        self.inner.lock().actuators.get(&actuator_type).cloned()
    }

    /// Snapshot and delta subscription taken under the same lock.
    ///
    /// Every event with `seq` greater than the snapshot's arrives on the
    /// receiver; none at or below it does.
    #[must_use]
    pub fn connect_observer(&self) -> (Snapshot, broadcast::Receiver<HubEvent>) {
        let inner = self.inner.lock();
        let rx = self.events.subscribe();
        (inner.snapshot(now()), rx)
    }

    /// Subscribe to deltas without a snapshot.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.events.subscriber_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomhub_domain::actuator::ActuatorStatus;
    use roomhub_domain::notification::Severity;
    use roomhub_domain::time::seconds;

    fn store() -> StateStore {
        StateStore::new(&StoreConfig::default())
    }

    fn temp(value: f64, at: Timestamp) -> SensorReading {
        SensorReading::new(SensorType::Temperature, value, at)
    }

    #[test]
    fn should_keep_latest_timestamp_as_current_under_reordering() {
        let store = store();
        let t0 = now();
        let arrivals = [
            temp(21.0, t0 + seconds(2)),
            temp(20.0, t0),
            temp(23.0, t0 + seconds(4)),
            temp(22.0, t0 + seconds(3)),
            temp(20.5, t0 + seconds(1)),
        ];

        for reading in arrivals {
            store.update_sensor(reading);
        }

        let snap = store.snapshot();
        assert_eq!(snap.number(SensorType::Temperature), Some(23.0));
        let history: Vec<f64> = store
            .history(SensorType::Temperature, 10)
            .iter()
            .filter_map(|r| r.value.number())
            .collect();
        assert_eq!(history, vec![20.0, 20.5, 21.0, 22.0, 23.0]);
    }

    #[test]
    fn should_report_stale_reading() {
        let store = store();
        let t0 = now();
        store.update_sensor(temp(22.0, t0));

        let outcome = store.update_sensor(temp(18.0, t0 - seconds(5)));

        let SensorUpdate::Stale(err) = outcome else {
            panic!("expected stale, got {outcome:?}");
        };
        assert_eq!(err.current, t0);
        assert_eq!(store.snapshot().number(SensorType::Temperature), Some(22.0));
    }

    #[test]
    fn should_ignore_duplicate_reading() {
        let store = store();
        let mut rx = store.subscribe();
        let reading = temp(22.0, now());

        assert_eq!(store.update_sensor(reading.clone()), SensorUpdate::Applied);
        assert_eq!(store.update_sensor(reading), SensorUpdate::Duplicate);

        assert_eq!(store.history(SensorType::Temperature, 10).len(), 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn should_bound_history() {
        let store = StateStore::new(&StoreConfig {
            history_capacity: 3,
            ..StoreConfig::default()
        });
        let t0 = now();
        for i in 0..5_u32 {
            store.update_sensor(temp(f64::from(i), t0 + seconds(i)));
        }
        let history = store.history(SensorType::Temperature, 100);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].value.number(), Some(2.0));
    }

    #[test]
    fn should_apply_command_once() {
        let store = store();
        let mut rx = store.subscribe();
        let cmd = Command::manual(ActuatorType::SmartLight)
            .with_state(ActuatorStatus::On)
            .with_param("brightness", 80.0);
        let t0 = now();

        let first = store.update_actuator(&cmd, t0).unwrap();
        let second = store.update_actuator(&cmd, t0 + seconds(10)).unwrap();

        let state = first.unwrap();
        assert_eq!(state.state, ActuatorStatus::On);
        assert!(!state.auto_mode);
        assert!(second.is_none());
        assert_eq!(store.actuator(ActuatorType::SmartLight).unwrap().last_changed, t0);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn should_assign_increasing_sequence_numbers() {
        let store = store();
        let mut rx = store.subscribe();
        store.update_sensor(temp(22.0, now()));
        store.push_notification(Notification::new("climate", Severity::Info, "hi", now()));
        store.set_bus_connected(true);

        let seqs: Vec<u64> = (0..3).map(|_| rx.try_recv().unwrap().seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(store.snapshot().seq, 3);
    }

    #[test]
    fn should_emit_bus_status_on_change_only() {
        let store = store();
        assert!(store.set_bus_connected(true));
        assert!(!store.set_bus_connected(true));
        assert!(store.set_bus_connected(false));
        assert!(!store.snapshot().bus_connected);
    }

    #[test]
    fn should_evict_oldest_notification() {
        let store = StateStore::new(&StoreConfig {
            notification_capacity: 2,
            ..StoreConfig::default()
        });
        for msg in ["a", "b", "c"] {
            store.push_notification(Notification::new("x", Severity::Info, msg, now()));
        }
        let messages: Vec<String> = store
            .snapshot()
            .notifications
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(messages, vec!["b", "c"]);
    }

    #[test]
    fn should_count_violations_and_keep_last_sessions() {
        let store = StateStore::new(&StoreConfig {
            session_capacity: 2,
            ..StoreConfig::default()
        });
        let t0 = now();
        store.record_violation(SensorType::Noise);
        store.record_violation(SensorType::Noise);
        store.record_violation(SensorType::Temperature);
        for minutes in [10, 20, 30] {
            store.record_session(StudySession::new(t0, t0 + seconds(minutes * 60)));
        }

        let (violations, sessions) = store.comfort_log();

        assert_eq!(violations[&SensorType::Noise], 2);
        assert_eq!(violations[&SensorType::Temperature], 1);
        assert!(!violations.contains_key(&SensorType::Humidity));
        let durations: Vec<i64> = sessions.iter().map(|s| s.duration_minutes).collect();
        assert_eq!(durations, vec![20, 30]);
    }

    #[test]
    fn should_hand_observer_no_gap_and_no_duplicate() {
        let store = store();
        store.update_sensor(temp(21.0, now()));

        let (snap, mut rx) = store.connect_observer();
        store.update_sensor(temp(22.0, now() + seconds(1)));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.seq, snap.seq + 1);
        assert!(rx.try_recv().is_err());
    }
}
