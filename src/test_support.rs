//! Scripted fakes shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{ChatMessage, LlmClient, LlmError};
use crate::tools::{SearchHits, SearchQuery, SequenceSource, ToolError};

/// Returns canned replies in order and records every call.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, u16>>>,
    calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl ScriptedLlm {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue an API failure with the given status.
    pub fn then_fail(self, status: u16) -> Self {
        self.replies.lock().unwrap().push_back(Err(status));
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<ChatMessage>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), messages.to_vec()));
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(status)) => Err(LlmError::Api {
                status,
                message: "scripted failure".to_string(),
            }),
            None => Err(LlmError::MalformedResponse("script exhausted".to_string())),
        }
    }
}

/// In-memory sequence database.
pub struct FakeSource {
    ids: Vec<String>,
    with_records: bool,
    queries: Mutex<Vec<String>>,
    fetched: Mutex<Vec<Vec<String>>>,
}

impl FakeSource {
    pub fn with_ids(ids: &[&str]) -> Self {
        Self {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            with_records: true,
            queries: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Every fetched identifier is reported missing.
    pub fn without_records(mut self) -> Self {
        self.with_records = false;
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<Vec<String>> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl SequenceSource for FakeSource {
    async fn search(&self, query: &SearchQuery) -> Result<SearchHits, ToolError> {
        self.queries.lock().unwrap().push(query.expression().to_string());
        Ok(SearchHits {
            identifiers: self.ids.clone(),
            reference_url: "https://example.org/search".to_string(),
        })
    }

    async fn fetch_records(&self, identifiers: &[String]) -> Result<Vec<Value>, ToolError> {
        self.fetched.lock().unwrap().push(identifiers.to_vec());
        if !self.with_records {
            return Ok(Vec::new());
        }
        Ok(identifiers.iter().map(|id| record(id)).collect())
    }
}

pub fn record(id: &str) -> Value {
    json!({
        "rnacentral_id": id,
        "sequence": "GCCCGGAUAGCUCAGUCGGUAGAGCAG",
        "length": 72,
        "description": "Homo sapiens tRNA-Glu",
    })
}
