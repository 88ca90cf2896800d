//! Sensor history queries.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use roomhub_app::ports::BusTransport;
use roomhub_domain::sensor::{SensorReading, SensorType};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// `GET /api/sensors/{sensor_type}/history?limit=`: recent readings,
/// oldest first.
pub async fn history<T: BusTransport>(
    State(state): State<AppState<T>>,
    Path(sensor_type): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<SensorReading>>, ApiError> {
    let sensor_type: SensorType = sensor_type.parse()?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    Ok(Json(state.hub.store().history(sensor_type, limit)))
}
