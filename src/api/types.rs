//! API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::TurnResult;
use crate::llm::ChatMessage;

pub const DEFAULT_SESSION_ID: &str = "default";
pub const DEFAULT_RESPONSE_MODE: &str = "intermediate";

fn default_response_mode() -> String {
    DEFAULT_RESPONSE_MODE.to_string()
}

/// Request to run one chat turn.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    #[serde(default)]
    pub message: Option<String>,

    /// Tone/depth label passed through to the prompt (beginner, intermediate, expert, ...)
    #[serde(default = "default_response_mode")]
    pub response_mode: String,

    /// Conversation to continue (shared default conversation if omitted)
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Result of a chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Text shown to the user
    pub chatbot_response: String,

    /// Raw records returned by a tool (null if none)
    pub api_data: Option<Vec<Value>>,

    /// Link to the full search results (null if none)
    pub full_results_url: Option<String>,

    /// Conversation the turn belongs to
    pub session_id: String,
}

impl ChatResponse {
    pub fn new(result: TurnResult, session_id: String) -> Self {
        Self {
            chatbot_response: result.reply_text,
            api_data: result.tool_data,
            full_results_url: result.reference_url,
            session_id,
        }
    }
}

/// Request to add feedback to a conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub feedback: Option<String>,

    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body of the clear endpoints; an empty body targets the default conversation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Query string of `GET /api/history`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Stored state of one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<ChatMessage>,
    pub feedback: Vec<String>,
    pub created_at: String,
}

/// Response after creating a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Acknowledgement for state-changing endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}
