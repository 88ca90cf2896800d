//! Axum router assembly.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use roomhub_app::ports::BusTransport;

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Nests the JSON API under `/api` and the observer socket at `/ws`.
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level using the `tracing` ecosystem.
pub fn build<T: BusTransport>(state: AppState<T>) -> Router {
    Router::new()
        .route("/health", get(health_check::<T>))
        .route("/ws", get(crate::ws::upgrade::<T>))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    bus_connected: bool,
    observers: usize,
}

async fn health_check<T: BusTransport>(State(state): State<AppState<T>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        bus_connected: state.hub.bus_stats().connected,
        observers: state.hub.fanout().observer_count(),
    })
}
