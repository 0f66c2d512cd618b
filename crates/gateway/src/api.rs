//! Autopilot and session endpoints.

use std::convert::Infallible;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use marionette_autopilot::{AutopilotRequest, StagePosition};
use marionette_core::history::SessionId;
use marionette_core::message::Message;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use crate::{ErrorResponse, SharedState};

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Last line written if a command ever fails to serialize.
const SERIALIZE_FAILURE_LINE: &str = "{\"error\":\"failed to encode command\"}\n";

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: message.into() }))
}

#[derive(Debug, Deserialize)]
pub struct AutopilotBody {
    #[serde(default, alias = "instruction")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub position: Option<StagePosition>,
    #[serde(default)]
    pub rotation: Option<f64>,
    #[serde(default)]
    pub provider: Option<String>,
}

impl AutopilotBody {
    fn into_request(self) -> Result<AutopilotRequest, ApiError> {
        let instruction = self.prompt.as_deref().map(str::trim).unwrap_or_default();
        if instruction.is_empty() {
            return Err(api_error(StatusCode::BAD_REQUEST, "prompt must not be empty"));
        }

        Ok(AutopilotRequest {
            instruction: instruction.to_string(),
            session_id: non_blank(self.session_id).map(SessionId::new),
            position: self.position,
            rotation: self.rotation,
            provider: non_blank(self.provider),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `POST /api/autopilot`: stream commands as newline-delimited JSON.
pub async fn autopilot_handler(
    State(state): State<SharedState>,
    Json(body): Json<AutopilotBody>,
) -> Result<Response, ApiError> {
    let request = body.into_request()?;
    info!(
        session = request.session_id.as_ref().map(SessionId::as_str).unwrap_or("<default>"),
        chars = request.instruction.chars().count(),
        "Autopilot stream requested"
    );

    let rx = state.autopilot.run(request);
    let lines = ReceiverStream::new(rx).map(|command| {
        let line = command.to_line().unwrap_or_else(|e| {
            error!(error = %e, kind = command.kind(), "Failed to encode command");
            SERIALIZE_FAILURE_LINE.to_string()
        });
        Ok::<_, Infallible>(Bytes::from(line))
    });

    Ok((
        [
            (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(lines),
    )
        .into_response())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub turns: Vec<Message>,
}

/// `GET /api/autopilot/sessions/{id}`: 404 for sessions never used.
pub async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = SessionId::new(id);
    let turns = state
        .autopilot
        .history()
        .find(&session)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("session '{session}' not found"),
            )
        })?;

    Ok(Json(SessionResponse {
        session_id: session.0,
        turns,
    }))
}

/// `DELETE /api/autopilot/sessions/{id}`
pub async fn delete_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session = SessionId::new(id);
    let removed = state
        .autopilot
        .history()
        .clear(&session)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    if removed {
        info!(session = %session, "Session cleared");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(
            StatusCode::NOT_FOUND,
            format!("session '{session}' not found"),
        ))
    }
}
