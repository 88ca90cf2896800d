//! Manual actuator commands, shared by the JSON API and the observer socket.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use roomhub_app::hub::Hub;
use roomhub_app::ports::{BusTransport, DispatchOutcome};
use roomhub_domain::actuator::{ActuatorState, ActuatorType};
use roomhub_domain::command::{CommandOrigin, CommandPayload};
use roomhub_domain::error::{HubError, UnknownEntityError};

use crate::error::ApiError;
use crate::state::AppState;

/// `{actuator_type, command}` as sent by observers.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub actuator_type: String,
    pub command: CommandPayload,
}

/// The actuator state after a command was handled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandAck {
    pub actuator_type: ActuatorType,
    pub state: ActuatorState,
}

/// Apply `request` as a manual command.
///
/// Requests always count as manual, whatever `origin` they claim. A command
/// that changes nothing is acknowledged with the current state.
pub async fn submit<T: BusTransport>(
    hub: &Hub<T>,
    request: CommandRequest,
) -> Result<CommandAck, HubError> {
    let actuator_type: ActuatorType = request.actuator_type.parse()?;
    let mut command = request.command.into_command(actuator_type);
    command.origin = CommandOrigin::Manual;

    let state = match hub.apply_command(command).await? {
        DispatchOutcome::Applied(state) => state,
        DispatchOutcome::Unchanged | DispatchOutcome::Overridden => hub
            .store()
            .actuator(actuator_type)
            .ok_or_else(|| UnknownEntityError::new("actuator", actuator_type.as_str()))?,
    };
    Ok(CommandAck {
        actuator_type,
        state,
    })
}

/// `POST /api/command`
pub async fn send<T: BusTransport>(
    State(state): State<AppState<T>>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandAck>, ApiError> {
    let ack = submit(&state.hub, request).await?;
    Ok(Json(ack))
}
