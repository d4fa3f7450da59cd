//! In-memory conversation store (non-persistent).
//!
//! Every conversation gets its own `Chatbot`, so history and feedback never
//! bleed between callers and only turns within one conversation serialize.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use crate::agent::Chatbot;
use crate::llm::LlmClient;
use crate::tools::ToolRegistry;

const MAX_SESSION_ID_LEN: usize = 128;

/// Whether `id` is acceptable as a conversation key.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Chatbot>>>,
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    history_limit: usize,
}

impl SessionStore {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, history_limit: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            llm,
            tools,
            history_limit,
        }
    }

    /// Existing conversation, if any. Counts as activity.
    ///
    /// The conversation is touched while the map lock is held, so the reaper
    /// cannot drop it between lookup and use.
    pub async fn get(&self, id: &str) -> Option<Arc<Chatbot>> {
        let sessions = self.sessions.read().await;
        let bot = sessions.get(id)?;
        bot.touch();
        Some(Arc::clone(bot))
    }

    /// Existing conversation or a fresh one.
    pub async fn get_or_create(&self, id: &str) -> Arc<Chatbot> {
        if let Some(bot) = self.get(id).await {
            return bot;
        }
        let mut sessions = self.sessions.write().await;
        let bot = Arc::clone(sessions.entry(id.to_string()).or_insert_with(|| {
            tracing::debug!(session_id = %id, "Creating conversation");
            Arc::new(Chatbot::new(
                Arc::clone(&self.llm),
                Arc::clone(&self.tools),
                self.history_limit,
            ))
        }));
        bot.touch();
        bot
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop conversations idle for longer than `ttl`. Conversations with a
    /// turn in progress are kept. Returns the number removed.
    pub async fn evict_idle(&self, ttl: std::time::Duration) -> usize {
        let Ok(ttl) = Duration::from_std(ttl) else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, bot| match bot.try_last_active() {
            Some(last_active) => last_active >= cutoff,
            None => true,
        });
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(removed, remaining = sessions.len(), "Evicted idle conversations");
        }
        removed
    }
}
