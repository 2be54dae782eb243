use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use super::dto;
use super::handlers;
use crate::error;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Barney API",
        version = "1.0.0",
        description = "Barney is your personal sommelier. Ask for a wine and get a recommendation grounded in real reviews.",
    ),
    paths(
        handlers::ask::ask,
        handlers::sessions::get_session,
        handlers::sessions::delete_session,
        handlers::health::health_check,
    ),
    components(schemas(
        error::ErrorCode,
        error::ErrorBody,
        error::ErrorDetail,
        models::Role,
        dto::AskRequest,
        dto::AskResponse,
        dto::SessionResponse,
        dto::TurnDto,
        handlers::health::HealthData,
    )),
    tags(
        (name = "ask", description = "Wine questions and answers"),
        (name = "sessions", description = "Conversation history"),
        (name = "health", description = "Health check"),
    ),
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
