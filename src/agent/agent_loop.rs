//! Core chat turn implementation.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use super::prompt::{build_messages, build_system_prompt};
use super::state::{ConversationState, FeedbackStore};
use crate::llm::{ChatMessage, LlmClient, LlmError};
use crate::tools::{ToolContext, ToolError, ToolRegistry};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("No message provided")]
    EmptyInput,

    #[error(transparent)]
    Gateway(#[from] LlmError),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Outcome of one user turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnResult {
    /// Text shown to the user.
    pub reply_text: String,
    /// Raw records fetched by a tool, if one ran and found any.
    pub tool_data: Option<Vec<Value>>,
    /// Link reproducing the tool's lookup.
    pub reference_url: Option<String>,
}

impl TurnResult {
    /// A plain reply with no tool output.
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            reply_text: text.into(),
            tool_data: None,
            reference_url: None,
        }
    }
}

struct SessionState {
    history: ConversationState,
    feedback: FeedbackStore,
}

/// One conversation: history, feedback and the turn loop that drives them.
///
/// Turns on the same instance are serialized; independent instances run
/// concurrently.
pub struct Chatbot {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    state: Mutex<SessionState>,
    /// Milliseconds since the epoch; readable without waiting for a turn.
    last_active_ms: AtomicI64,
    created_at: DateTime<Utc>,
}

impl Chatbot {
    /// `history_limit` is the number of exchanges kept (0 = unbounded).
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, history_limit: usize) -> Self {
        let now = Utc::now();
        Self {
            llm,
            tools,
            state: Mutex::new(SessionState {
                history: ConversationState::new(history_limit),
                feedback: FeedbackStore::new(),
            }),
            last_active_ms: AtomicI64::new(now.timestamp_millis()),
            created_at: now,
        }
    }

    /// Run one user turn end to end.
    ///
    /// The exchange is appended to the history only when the turn succeeds;
    /// a failed turn leaves the history untouched.
    pub async fn handle_turn(
        &self,
        user_input: &str,
        response_mode: &str,
    ) -> Result<TurnResult, ChatError> {
        if user_input.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }

        let mut state = self.state.lock().await;
        self.touch();

        let system = build_system_prompt(response_mode, &state.feedback);
        let messages = build_messages(&state.history, user_input);

        tracing::debug!(
            response_mode = %response_mode,
            history = state.history.len(),
            "Starting chat turn"
        );

        let reply = self.llm.complete(&system, &messages).await?;
        let result = self.process_reply(reply, &messages, &system).await?;

        state.history.record_turn(user_input, &result.reply_text);
        self.touch();
        Ok(result)
    }

    /// Hand the reply to the first matching tool, or return it as is.
    async fn process_reply(
        &self,
        reply: String,
        messages: &[ChatMessage],
        system: &str,
    ) -> Result<TurnResult, ChatError> {
        let Some((trigger, handler)) = self.tools.dispatch(&reply).await else {
            return Ok(TurnResult::reply(reply));
        };

        tracing::info!(trigger = %trigger, tool = handler.name(), "Model requested a tool");
        handler
            .handle(ToolContext {
                trigger: &trigger,
                reply: &reply,
                messages,
                system,
                llm: self.llm.as_ref(),
            })
            .await
    }

    pub async fn add_feedback(&self, feedback: &str) {
        let mut state = self.state.lock().await;
        state.feedback.add(feedback);
        self.touch();
    }

    pub async fn clear_history(&self) {
        let mut state = self.state.lock().await;
        state.history.clear();
        self.touch();
    }

    pub async fn clear_feedback(&self) {
        let mut state = self.state.lock().await;
        state.feedback.clear();
        self.touch();
    }

    /// Snapshot of the stored history.
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.state.lock().await.history.messages().to_vec()
    }

    /// Snapshot of the stored feedback.
    pub async fn feedback(&self) -> Vec<String> {
        self.state.lock().await.feedback.entries().to_vec()
    }

    /// Mark the conversation as in use.
    pub fn touch(&self) {
        self.last_active_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_active_ms.load(Ordering::Relaxed))
            .unwrap_or(self.created_at)
    }

    /// Like `last_active`, but `None` while a turn holds the state.
    pub fn try_last_active(&self) -> Option<DateTime<Utc>> {
        let _guard = self.state.try_lock().ok()?;
        Some(self.last_active())
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
