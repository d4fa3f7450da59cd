//! Tool dispatch for the chat loop.
//!
//! The model requests a tool by writing its trigger token (e.g.
//! `FETCH_TRNA_SEQUENCES`) followed by a directive anywhere in its reply.
//! Matching is done on the uppercased reply text; the first registered
//! trigger found wins and at most one tool runs per turn.

pub mod query;
pub mod rnacentral;
pub mod trna;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::agent::{ChatError, TurnResult};
use crate::config::Config;
use crate::llm::{ChatMessage, LlmClient};

pub use query::{construct_search_query, ResultLimit, SearchQuery, ToolDirective};
pub use rnacentral::{RnaCentralClient, SearchHits, SequenceSource};
pub use trna::{TrnaSequenceTool, FETCH_TRNA_SEQUENCES};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid tool directive: {0}")]
    InvalidDirective(String),

    #[error("External lookup timed out")]
    Timeout,

    #[error("External lookup failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("External service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed external response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ToolError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ToolError::Timeout
        } else if e.is_decode() {
            ToolError::MalformedResponse(e.to_string())
        } else {
            ToolError::Http(e)
        }
    }
}

/// Everything a handler needs to finish a tool-triggered turn.
pub struct ToolContext<'a> {
    /// The trigger token that selected this handler.
    pub trigger: &'a str,
    /// The model's first reply, containing the directive.
    pub reply: &'a str,
    /// The message sequence that produced `reply`.
    pub messages: &'a [ChatMessage],
    /// The system prompt used for `reply`; reused for the follow-up call.
    pub system: &'a str,
    /// Gateway for the follow-up completion.
    pub llm: &'a dyn LlmClient,
}

/// Completes a turn once its trigger token has been seen in a reply.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    async fn handle(&self, ctx: ToolContext<'_>) -> Result<TurnResult, ChatError>;
}

struct ToolEntry {
    trigger: String,
    handler: Arc<dyn ToolHandler>,
}

/// Registry of trigger tokens, matched in registration order.
pub struct ToolRegistry {
    entries: RwLock<Vec<ToolEntry>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Registry with the RNAcentral tRNA lookup registered.
    pub fn with_defaults(config: &Config, http: reqwest::Client) -> Self {
        let source = Arc::new(RnaCentralClient::new(http, config.rnacentral.clone()));
        let handler: Arc<dyn ToolHandler> = Arc::new(TrnaSequenceTool::new(source));
        Self {
            entries: RwLock::new(vec![ToolEntry {
                trigger: FETCH_TRNA_SEQUENCES.to_string(),
                handler,
            }]),
        }
    }

    /// Register a handler for `trigger`. Re-registering an existing trigger
    /// replaces its handler and keeps its position in the match order.
    pub async fn register(&self, trigger: &str, handler: Arc<dyn ToolHandler>) {
        let trigger = trigger.trim().to_uppercase();
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.iter_mut().find(|e| e.trigger == trigger) {
            tracing::info!(trigger = %trigger, tool = handler.name(), "Replacing tool handler");
            entry.handler = handler;
        } else {
            tracing::info!(trigger = %trigger, tool = handler.name(), "Registering tool");
            entries.push(ToolEntry { trigger, handler });
        }
    }

    /// First handler whose trigger occurs in the uppercased reply.
    pub async fn dispatch(&self, reply: &str) -> Option<(String, Arc<dyn ToolHandler>)> {
        let upper = reply.to_uppercase();
        self.entries
            .read()
            .await
            .iter()
            .find(|e| !e.trigger.is_empty() && upper.contains(&e.trigger))
            .map(|e| (e.trigger.clone(), Arc::clone(&e.handler)))
    }

    /// Registered triggers in match order.
    pub async fn triggers(&self) -> Vec<String> {
        self.entries
            .read()
            .await
            .iter()
            .map(|e| e.trigger.clone())
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Text following the first case-insensitive occurrence of `trigger`;
/// the whole reply when the token cannot be located.
pub fn directive_text<'a>(reply: &'a str, trigger: &str) -> &'a str {
    let upper = reply.to_ascii_uppercase();
    match upper.find(&trigger.to_ascii_uppercase()) {
        Some(pos) if !trigger.is_empty() => &reply[pos + trigger.len()..],
        _ => reply,
    }
}
