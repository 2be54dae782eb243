use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use crate::api::dto::{AskRequest, AskResponse};
use crate::api::extractors::AppJson;
use crate::api::AppState;
use crate::error::{BarneyError, ErrorBody, Result};

pub const SESSION_HEADER: &str = "x-session-id";

/// `POST /ask`
///
/// Answers a wine question, continuing the given session when one is named.
#[utoipa::path(
    post,
    path = "/ask",
    tag = "ask",
    request_body = AskRequest,
    params(
        ("x-session-id" = Option<String>, Header, description = "Session to continue when the body names none"),
    ),
    responses(
        (status = 200, description = "Barney's answer", body = AskResponse),
        (status = 400, description = "Malformed body or empty query", body = ErrorBody),
        (status = 502, description = "An upstream service answered with an invalid response", body = ErrorBody),
        (status = 503, description = "An upstream service is unavailable or timed out", body = ErrorBody),
    )
)]
pub async fn ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(req): AppJson<AskRequest>,
) -> Result<Json<AskResponse>> {
    if req.query.trim().is_empty() {
        return Err(BarneyError::Validation("Query cannot be empty".to_string()));
    }

    let header_session = headers
        .get(SESSION_HEADER)
        .map(|value| {
            value.to_str().map_err(|_| {
                BarneyError::Validation(format!("{SESSION_HEADER} header must be visible ASCII"))
            })
        })
        .transpose()?;
    let requested = req.session_id.as_deref().or(header_session);

    let (session_id, handle) = state.sessions.checkout(requested)?;

    // Waiting behind another request on the same session counts against the
    // timeout too.
    let timeout_secs = state.config.server.request_timeout_secs;
    let (response, turns) = tokio::time::timeout(Duration::from_secs(timeout_secs), async {
        let mut session = handle.lock().await;
        let response = state.sommelier.ask(&req.query, &mut session.history).await?;
        Ok::<_, BarneyError>((response, session.history.len()))
    })
    .await
    .map_err(|_| BarneyError::Timeout(timeout_secs))??;

    tracing::info!(session_id = %session_id, turns, "Answered question");

    Ok(Json(AskResponse {
        response,
        session_id,
    }))
}
