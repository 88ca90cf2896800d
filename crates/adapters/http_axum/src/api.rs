//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod commands;
#[allow(clippy::missing_errors_doc)]
pub mod sensors;
pub mod snapshot;
pub mod sse;

use axum::Router;
use axum::routing::{get, post};

use roomhub_app::ports::BusTransport;

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<T: BusTransport>() -> Router<AppState<T>> {
    Router::new()
        .route("/snapshot", get(snapshot::current::<T>))
        .route("/analytics", get(snapshot::analytics::<T>))
        .route("/stats", get(snapshot::stats::<T>))
        .route("/sensors/{sensor_type}/history", get(sensors::history::<T>))
        .route("/command", post(commands::send::<T>))
        .route("/events/stream", get(sse::stream::<T>))
}
