//! Per-conversation state: chat history and accumulated user feedback.

use serde::Serialize;

use crate::llm::ChatMessage;

/// Chronological chat history with an optional retention cap.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationState {
    turns: Vec<ChatMessage>,
    #[serde(skip)]
    max_turns: usize,
}

impl ConversationState {
    /// `max_turns` counts user/assistant exchanges; `0` keeps everything.
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append one completed exchange, then drop the oldest exchanges beyond
    /// the retention cap.
    pub fn record_turn(&mut self, user_input: &str, reply: &str) {
        self.turns.push(ChatMessage::user(user_input));
        self.turns.push(ChatMessage::assistant(reply));

        if self.max_turns > 0 {
            let max_messages = self.max_turns * 2;
            if self.turns.len() > max_messages {
                let excess = self.turns.len() - max_messages;
                self.turns.drain(..excess);
            }
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Append-only list of free-text feedback, rendered into every system prompt.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedbackStore {
    entries: Vec<String>,
}

impl FeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, feedback: impl Into<String>) {
        self.entries.push(feedback.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
