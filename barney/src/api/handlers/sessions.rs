use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::dto::{SessionResponse, TurnDto};
use crate::api::AppState;
use crate::error::{BarneyError, ErrorBody, Result};

/// `GET /sessions/{session_id}`
#[utoipa::path(
    get,
    path = "/sessions/{session_id}",
    tag = "sessions",
    params(("session_id" = String, Path, description = "Session id returned by /ask")),
    responses(
        (status = 200, description = "Turns recorded for the session", body = SessionResponse),
        (status = 404, description = "Unknown or expired session", body = ErrorBody),
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>> {
    let handle = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| BarneyError::SessionNotFound(session_id.clone()))?;
    let session = handle.lock().await;

    Ok(Json(SessionResponse {
        session_id: session.id.clone(),
        created_at: session.created_at,
        max_turns: session.history.max_turns(),
        turns: session.history.history().iter().map(TurnDto::from).collect(),
    }))
}

/// `DELETE /sessions/{session_id}`
#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    tag = "sessions",
    params(("session_id" = String, Path, description = "Session id returned by /ask")),
    responses(
        (status = 204, description = "Session ended"),
        (status = 404, description = "Unknown or expired session", body = ErrorBody),
    )
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode> {
    if state.sessions.remove(&session_id) {
        tracing::debug!(session_id = %session_id, "Session ended by client");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(BarneyError::SessionNotFound(session_id))
    }
}
