//! WebSocket observer sessions.
//!
//! A session sends the initial snapshot once, then forwards every committed
//! delta in order while answering requests from the client. A client that
//! reads too slowly loses its oldest deltas; the hub never waits for it.

pub mod protocol;

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};

use roomhub_app::hub::Hub;
use roomhub_app::ports::BusTransport;

use crate::api::commands;
use crate::state::AppState;

use self::protocol::{ClientMessage, ServerMessage};

/// `GET /ws`
pub async fn upgrade<T: BusTransport>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<T>>,
) -> Response {
    ws.on_upgrade(move |socket| serve(socket, state.hub))
}

async fn serve<T: BusTransport>(socket: WebSocket, hub: Arc<Hub<T>>) {
    let mut session = hub.fanout().connect();
    let (mut sender, mut receiver) = socket.split();

    if let Some(snapshot) = session.take_initial()
        && send(&mut sender, &ServerMessage::InitialSnapshot { snapshot })
            .await
            .is_err()
    {
        return;
    }

    loop {
        let outgoing = tokio::select! {
            event = session.next_event() => match event {
                Some(event) => ServerMessage::from_event(&event),
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_client_message(&hub, text.as_str()).await,
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => continue,
            },
        };
        if send(&mut sender, &outgoing).await.is_err() {
            break;
        }
    }

    if let Err(err) = sender.close().await {
        tracing::debug!(observer = %session.id(), %err, "websocket already closed");
    }
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(err) => {
            tracing::warn!(%err, "failed to serialize observer message");
            Ok(())
        }
    }
}

/// Answer one client frame. Never fails; problems come back as `error`.
pub async fn handle_client_message<T: BusTransport>(hub: &Hub<T>, text: &str) -> ServerMessage {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            tracing::warn!(%err, "failed to parse observer message");
            return ServerMessage::error(format!("invalid message: {err}"));
        }
    };

    match message {
        ClientMessage::SendCommand(request) => match commands::submit(hub, request).await {
            Ok(ack) => ServerMessage::CommandAck(ack),
            Err(err) => {
                tracing::info!(%err, "observer command rejected");
                ServerMessage::error(err.to_string())
            }
        },
        ClientMessage::Analytics => ServerMessage::Analytics(hub.fanout().analytics()),
        ClientMessage::RequestSnapshot => ServerMessage::Snapshot {
            snapshot: hub.snapshot(),
        },
    }
}
