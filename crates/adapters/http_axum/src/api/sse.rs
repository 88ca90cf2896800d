//! Server-Sent Events (SSE) stream for real-time updates.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use futures::stream::{self, StreamExt};

use roomhub_app::ports::BusTransport;
use roomhub_domain::event::HubEvent;

use crate::state::AppState;

/// `GET /api/events/stream`: SSE stream of committed deltas.
///
/// Each delta is a JSON `data:` frame with its `seq` as the SSE id, so a
/// client can tell when it skipped some. The stream has no initial snapshot;
/// pair it with `GET /api/snapshot`. It ends when the hub shuts down.
pub async fn stream<T: BusTransport>(
    State(state): State<AppState<T>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = state.hub.fanout().connect();
    let events = stream::unfold(session, |mut session| async move {
        let event = session.next_event().await?;
        Some((event, session))
    })
    .filter_map(|event| async move { to_sse(&event).map(Ok) });

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn to_sse(event: &HubEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().id(event.seq.to_string()).data(json)),
        Err(err) => {
            tracing::warn!(%err, "failed to serialize delta for SSE stream");
            None
        }
    }
}
