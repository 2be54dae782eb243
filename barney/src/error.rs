use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// External services the orchestrator talks to. Used to tag upstream failures
/// in logs without leaking them to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Embeddings,
    Search,
    Chat,
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Embeddings => write!(f, "embeddings"),
            Self::Search => write!(f, "search"),
            Self::Chat => write!(f, "chat"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BarneyError {
    #[error("Missing required configuration: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid configuration for {var}: {reason}")]
    InvalidConfiguration { var: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Search returned no passages")]
    RetrievalEmpty,

    #[error("{service} returned an unexpected response: {detail}")]
    UpstreamContractViolation { service: Upstream, detail: String },

    #[error("{service} is unavailable: {detail}")]
    ServiceUnavailable { service: Upstream, detail: String },

    #[error("Request exceeded {0}s timeout")]
    Timeout(u64),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl BarneyError {
    pub fn unavailable(service: Upstream, detail: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            service,
            detail: detail.into(),
        }
    }

    pub fn contract(service: Upstream, detail: impl Into<String>) -> Self {
        Self::UpstreamContractViolation {
            service,
            detail: detail.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::InvalidRequest,
            Self::SessionNotFound(_) => ErrorCode::NotFound,
            Self::RetrievalEmpty => ErrorCode::NoResults,
            Self::UpstreamContractViolation { .. } => ErrorCode::UpstreamError,
            Self::ServiceUnavailable { .. } | Self::Timeout(_) => ErrorCode::ServiceUnavailable,
            Self::ConfigurationMissing(_)
            | Self::InvalidConfiguration { .. }
            | Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Message safe to show to end users. Upstream and internal detail stays
    /// in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::SessionNotFound(id) => format!("Session {id} not found"),
            Self::RetrievalEmpty => "No matching wines were found".to_string(),
            Self::UpstreamContractViolation { .. } => {
                "An upstream service returned an invalid response".to_string()
            }
            Self::ServiceUnavailable { .. } => {
                "An upstream service is currently unavailable, please try again later".to_string()
            }
            Self::Timeout(_) => "The request took too long, please try again later".to_string(),
            Self::ConfigurationMissing(_)
            | Self::InvalidConfiguration { .. }
            | Self::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

/// Machine-readable error code included in every error response.
///
/// Serialized as a snake_case string on the wire (e.g. `"service_unavailable"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed body or empty query. HTTP 400.
    InvalidRequest,
    /// Unknown or expired session. HTTP 404.
    NotFound,
    /// Retrieval produced nothing to answer from. HTTP 404.
    NoResults,
    /// A collaborator answered with data of the wrong shape. HTTP 502.
    UpstreamError,
    /// A collaborator could not be reached, timed out or refused us. HTTP 503.
    ServiceUnavailable,
    /// HTTP 500.
    InternalError,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::NoResults => StatusCode::NOT_FOUND,
            Self::UpstreamError => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error payload: `{ "error": { "code": "...", "message": "..." } }`.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
}

impl IntoResponse for BarneyError {
    fn into_response(self) -> Response {
        let code = self.code();

        match &self {
            Self::UpstreamContractViolation { .. }
            | Self::ServiceUnavailable { .. }
            | Self::Timeout(_)
            | Self::ConfigurationMissing(_)
            | Self::InvalidConfiguration { .. }
            | Self::Internal(_) => {
                tracing::error!(error = %self, code = ?code, "Request failed");
            }
            _ => {
                tracing::debug!(error = %self, code = ?code, "Request rejected");
            }
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message: self.public_message(),
            },
        };

        (code.status(), Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, BarneyError>;
