//! Comfort analytics: a heuristic score, recommendations and trends derived
//! from a [`Snapshot`]. Pure functions: safe to call concurrently and often.
//!
//! Also holds the records the hub keeps for analytics: out-of-band reading
//! checks and finished study sessions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sensor::{SensorReading, SensorType};
use crate::snapshot::Snapshot;
use crate::time::Timestamp;

/// Inclusive comfort range for one metric plus its penalty curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricBand {
    pub min: f64,
    pub max: f64,
    /// Penalty points per unit outside the band.
    pub slope: f64,
    /// Maximum unweighted penalty for this metric.
    pub cap: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl MetricBand {
    #[must_use]
    pub fn new(min: f64, max: f64, slope: f64, cap: f64) -> Self {
        Self {
            min,
            max,
            slope,
            cap,
            weight: default_weight(),
        }
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Distance outside the band, `0.0` inside.
    #[must_use]
    pub fn distance(&self, value: f64) -> f64 {
        if value < self.min {
            self.min - value
        } else if value > self.max {
            value - self.max
        } else {
            0.0
        }
    }

    /// Weighted penalty: zero inside, linear outside, capped.
    #[must_use]
    pub fn penalty(&self, value: f64) -> f64 {
        (self.distance(value) * self.slope).min(self.cap) * self.weight
    }
}

/// Comfort bands for the four scored metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComfortBands {
    pub temperature: MetricBand,
    pub humidity: MetricBand,
    pub light: MetricBand,
    pub noise: MetricBand,
}

impl Default for ComfortBands {
    fn default() -> Self {
        Self {
            temperature: MetricBand::new(20.0, 24.0, 10.0, 40.0),
            humidity: MetricBand::new(40.0, 60.0, 1.5, 20.0),
            light: MetricBand::new(300.0, 700.0, 0.1, 20.0),
            noise: MetricBand::new(0.0, 45.0, 2.0, 30.0),
        }
    }
}

impl ComfortBands {
    /// Band for a scored metric; motion is not scored.
    #[must_use]
    pub fn band(&self, sensor_type: SensorType) -> Option<&MetricBand> {
        match sensor_type {
            SensorType::Temperature => Some(&self.temperature),
            SensorType::Humidity => Some(&self.humidity),
            SensorType::Light => Some(&self.light),
            SensorType::Noise => Some(&self.noise),
            SensorType::Motion => None,
        }
    }

    /// Whether a numeric reading of a scored metric falls outside its band.
    #[must_use]
    pub fn violated_by(&self, reading: &SensorReading) -> bool {
        match (self.band(reading.sensor_type), reading.value.number()) {
            (Some(band), Some(value)) => !band.contains(value),
            _ => false,
        }
    }
}

/// A finished study session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySession {
    pub started: Timestamp,
    pub ended: Timestamp,
    pub duration_minutes: i64,
}

impl StudySession {
    #[must_use]
    pub fn new(started: Timestamp, ended: Timestamp) -> Self {
        Self {
            started,
            ended,
            duration_minutes: (ended - started).num_minutes(),
        }
    }
}

/// Derived comfort score. Never stored as authoritative state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComfortScore {
    /// `0.0..=100.0`
    pub value: f64,
    pub recommendations: Vec<String>,
}

const SCORED: [SensorType; 4] = [
    SensorType::Temperature,
    SensorType::Humidity,
    SensorType::Light,
    SensorType::Noise,
];

/// Score the snapshot. Metrics without a numeric reading contribute nothing.
#[must_use]
pub fn compute_score(snapshot: &Snapshot, bands: &ComfortBands) -> ComfortScore {
    let mut penalty = 0.0;
    let mut recommendations = Vec::new();

    for sensor_type in SCORED {
        let (Some(value), Some(band)) = (snapshot.number(sensor_type), bands.band(sensor_type))
        else {
            continue;
        };
        penalty += band.penalty(value);
        if let Some(text) = recommendation(sensor_type, band, value) {
            recommendations.push(text.to_string());
        }
    }

    ComfortScore {
        value: (100.0 - penalty).clamp(0.0, 100.0),
        recommendations,
    }
}

fn recommendation(sensor_type: SensorType, band: &MetricBand, value: f64) -> Option<&'static str> {
    let above = value > band.max;
    if band.contains(value) {
        return None;
    }
    Some(match (sensor_type, above) {
        (SensorType::Temperature, true) => "Room is too warm. Consider cooling down.",
        (SensorType::Temperature, false) => "Room is too cold. Consider increasing temperature.",
        (SensorType::Humidity, true) => "Air is too humid. Consider ventilating the room.",
        (SensorType::Humidity, false) => "Air is too dry. Consider using a humidifier.",
        (SensorType::Light, true) => "Light is very bright. Consider dimming to reduce glare.",
        (SensorType::Light, false) => {
            "Low light. Consider opening curtains or turning on lights."
        }
        (SensorType::Noise, true) => {
            "High noise levels. Consider noise-cancelling headphones or a quieter space."
        }
        (SensorType::Noise, false) => "Noise level is unusually low.",
        (SensorType::Motion, _) => return None,
    })
}

/// Direction of a metric over its recent history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Trend summary for one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub current: f64,
    pub average: f64,
    pub direction: TrendDirection,
}

/// Number of recent readings a trend is computed over.
pub const TREND_WINDOW: usize = 10;

/// Compare the mean of the newest half of the last [`TREND_WINDOW`] numeric
/// readings with the older half. A change beyond ±10 % counts as a trend.
/// Sensors with fewer readings are omitted.
#[must_use]
pub fn analyze_trends(
    history: &BTreeMap<SensorType, Vec<SensorReading>>,
) -> BTreeMap<SensorType, Trend> {
    let mut trends = BTreeMap::new();
    for (sensor_type, readings) in history {
        let values: Vec<f64> = readings.iter().filter_map(|r| r.value.number()).collect();
        if values.len() < TREND_WINDOW {
            continue;
        }
        let window = &values[values.len() - TREND_WINDOW..];
        let (older, recent) = window.split_at(TREND_WINDOW / 2);
        let older_avg = mean(older);
        let recent_avg = mean(recent);

        let direction = if recent_avg > older_avg * 1.1 {
            TrendDirection::Increasing
        } else if recent_avg < older_avg * 0.9 {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };

        trends.insert(
            *sensor_type,
            Trend {
                current: window[TREND_WINDOW - 1],
                average: (mean(window) * 100.0).round() / 100.0,
                direction,
            },
        );
    }
    trends
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    fn snapshot(temp: f64, humidity: f64, light: f64, noise: f64) -> Snapshot {
        let at = now();
        Snapshot::empty(at)
            .with_reading(SensorReading::new(SensorType::Temperature, temp, at))
            .with_reading(SensorReading::new(SensorType::Humidity, humidity, at))
            .with_reading(SensorReading::new(SensorType::Light, light, at))
            .with_reading(SensorReading::new(SensorType::Noise, noise, at))
    }

    #[test]
    fn should_score_perfect_when_all_in_band() {
        let score = compute_score(&snapshot(22.0, 50.0, 500.0, 35.0), &ComfortBands::default());
        assert!((score.value - 100.0).abs() < f64::EPSILON);
        assert!(score.recommendations.is_empty());
    }

    #[test]
    fn should_flag_only_out_of_band_numeric_readings() {
        let bands = ComfortBands::default();
        let at = now();

        assert!(bands.violated_by(&SensorReading::new(SensorType::Noise, 62.0, at)));
        assert!(bands.violated_by(&SensorReading::new(SensorType::Humidity, 35.0, at)));
        assert!(!bands.violated_by(&SensorReading::new(SensorType::Light, 450.0, at)));
        assert!(!bands.violated_by(&SensorReading::new(SensorType::Motion, true, at)));
    }

    #[test]
    fn should_measure_session_in_whole_minutes() {
        let start = now();
        let session = StudySession::new(start, start + crate::time::seconds(47 * 60 + 59));
        assert_eq!(session.duration_minutes, 47);
    }

    #[test]
    fn should_score_perfect_when_no_readings() {
        let score = compute_score(&Snapshot::empty(now()), &ComfortBands::default());
        assert!((score.value - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_penalise_linearly_outside_band() {
        let bands = ComfortBands::default();
        let score = compute_score(&snapshot(25.0, 50.0, 500.0, 35.0), &bands);
        assert!((score.value - 90.0).abs() < 1e-9);
        assert_eq!(score.recommendations, vec!["Room is too warm. Consider cooling down."]);
    }

    #[test]
    fn should_cap_each_metric_penalty() {
        let bands = ComfortBands::default();
        let hot = compute_score(&snapshot(60.0, 50.0, 500.0, 35.0), &bands);
        assert!((hot.value - 60.0).abs() < 1e-9);
    }

    #[test]
    fn should_floor_score_at_zero() {
        let mut bands = ComfortBands::default();
        bands.temperature.weight = 5.0;
        let score = compute_score(&snapshot(60.0, 0.0, 0.0, 120.0), &bands);
        assert!(score.value.abs() < f64::EPSILON);
        assert_eq!(score.recommendations.len(), 4);
    }

    #[test]
    fn should_not_increase_score_as_distance_grows() {
        let bands = ComfortBands::default();
        let mut previous = f64::INFINITY;
        for step in 0..200 {
            let noise = 30.0 + f64::from(step) * 0.5;
            let score = compute_score(&snapshot(22.0, 50.0, 500.0, noise), &bands).value;
            assert!(score <= previous, "score rose at noise={noise}");
            previous = score;
        }
        let mut previous = f64::INFINITY;
        for step in 0..200 {
            let temp = 20.0 - f64::from(step) * 0.1;
            let score = compute_score(&snapshot(temp, 50.0, 500.0, 35.0), &bands).value;
            assert!(score <= previous, "score rose at temp={temp}");
            previous = score;
        }
    }

    #[test]
    fn should_recommend_per_direction() {
        let score = compute_score(&snapshot(18.0, 70.0, 100.0, 60.0), &ComfortBands::default());
        assert_eq!(
            score.recommendations,
            vec![
                "Room is too cold. Consider increasing temperature.",
                "Air is too humid. Consider ventilating the room.",
                "Low light. Consider opening curtains or turning on lights.",
                "High noise levels. Consider noise-cancelling headphones or a quieter space.",
            ]
        );
    }

    fn series(sensor_type: SensorType, values: &[f64]) -> Vec<SensorReading> {
        let at = now();
        values
            .iter()
            .map(|v| SensorReading::new(sensor_type, *v, at))
            .collect()
    }

    #[test]
    fn should_detect_increasing_trend() {
        let mut history = BTreeMap::new();
        history.insert(
            SensorType::Noise,
            series(
                SensorType::Noise,
                &[40.0, 40.0, 40.0, 40.0, 40.0, 50.0, 50.0, 50.0, 50.0, 50.0],
            ),
        );
        let trends = analyze_trends(&history);
        let trend = &trends[&SensorType::Noise];
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert!((trend.current - 50.0).abs() < f64::EPSILON);
        assert!((trend.average - 45.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_detect_stable_and_decreasing_trends() {
        let mut history = BTreeMap::new();
        history.insert(SensorType::Temperature, series(SensorType::Temperature, &[22.0; 12]));
        history.insert(
            SensorType::Light,
            series(
                SensorType::Light,
                &[500.0, 500.0, 500.0, 500.0, 500.0, 300.0, 300.0, 300.0, 300.0, 300.0],
            ),
        );
        let trends = analyze_trends(&history);
        assert_eq!(trends[&SensorType::Temperature].direction, TrendDirection::Stable);
        assert_eq!(trends[&SensorType::Light].direction, TrendDirection::Decreasing);
    }

    #[test]
    fn should_skip_short_histories() {
        let mut history = BTreeMap::new();
        history.insert(SensorType::Humidity, series(SensorType::Humidity, &[50.0; 9]));
        assert!(analyze_trends(&history).is_empty());
    }
}
