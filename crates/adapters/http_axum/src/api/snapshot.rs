//! Read-only views over current hub state.

use axum::Json;
use axum::extract::State;

use roomhub_app::bus::BusStats;
use roomhub_app::fanout::AnalyticsReport;
use roomhub_app::ports::BusTransport;
use roomhub_domain::snapshot::Snapshot;

use crate::state::AppState;

/// `GET /api/snapshot`
pub async fn current<T: BusTransport>(State(state): State<AppState<T>>) -> Json<Snapshot> {
    Json(state.hub.snapshot())
}

/// `GET /api/analytics`: comfort score, recommendations and trends,
/// recomputed on every call.
pub async fn analytics<T: BusTransport>(
    State(state): State<AppState<T>>,
) -> Json<AnalyticsReport> {
    Json(state.hub.fanout().analytics())
}

/// `GET /api/stats`: bus connection and queue counters.
pub async fn stats<T: BusTransport>(State(state): State<AppState<T>>) -> Json<BusStats> {
    Json(state.hub.bus_stats())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use roomhub_domain::sensor::{SensorReading, SensorType};
    use roomhub_domain::time::{now, seconds};
    use tower::ServiceExt;

    use crate::router::build;
    use crate::testing;

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn should_return_current_snapshot() {
        let (state, _transport) = testing::state();
        state
            .hub
            .ingest_reading(SensorReading::new(SensorType::Temperature, 21.5, now()))
            .await;

        let (status, json) = get_json(build(state), "/api/snapshot").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["sensors"]["temperature"]["value"], 21.5);
        assert_eq!(json["actuators"]["smart_light"]["state"], "OFF");
    }

    #[tokio::test]
    async fn should_score_empty_room_as_fully_comfortable() {
        let (state, _transport) = testing::state();

        let (status, json) = get_json(build(state), "/api/analytics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["comfort_score"], 100.0);
        assert_eq!(json["recommendations"].as_array().unwrap().len(), 0);
        assert_eq!(json["comfort_violations"].as_object().unwrap().len(), 0);
        assert_eq!(json["study_sessions"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn should_count_noisy_readings_in_analytics() {
        let (state, _transport) = testing::state();
        let start = now();
        for (offset, value) in [(0, 52.0), (1, 40.0), (2, 61.0)] {
            state
                .hub
                .ingest_reading(SensorReading::new(SensorType::Noise, value, start + seconds(offset)))
                .await;
        }

        let (status, json) = get_json(build(state), "/api/analytics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["comfort_violations"]["noise"], 2);
    }

    #[tokio::test]
    async fn should_report_bus_stats() {
        let (state, _transport) = testing::state();

        let (status, json) = get_json(build(state), "/api/stats").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["connected"], true);
        assert_eq!(json["telemetry_dropped"], 0);
    }
}
