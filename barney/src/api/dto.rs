//! Request and response bodies for the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{ChatTurn, Role};

/// Body of `POST /ask`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AskRequest {
    /// The user's wine question.
    #[schema(example = "What is a good red wine to pair with steak?")]
    pub query: String,
    /// Conversation to continue. A new one is started when omitted.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AskResponse {
    /// Barney's answer.
    pub response: String,
    /// Session the answer belongs to. Send it back to continue the conversation.
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TurnDto {
    pub role: Role,
    pub content: String,
    #[schema(value_type = String)]
    pub timestamp: DateTime<Utc>,
}

impl From<&ChatTurn> for TurnDto {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
            timestamp: turn.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub session_id: String,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    pub max_turns: usize,
    pub turns: Vec<TurnDto>,
}
