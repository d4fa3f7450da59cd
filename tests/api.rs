//! Router-level tests driving the HTTP API with scripted collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use trna_assistant::api::{router, AppState};
use trna_assistant::llm::{ChatMessage, LlmClient, LlmError};
use trna_assistant::tools::{
    SearchHits, SearchQuery, SequenceSource, ToolError, ToolRegistry, TrnaSequenceTool,
    FETCH_TRNA_SEQUENCES,
};
use trna_assistant::Config;

#[derive(Default)]
struct ScriptedLlm {
    replies: Mutex<VecDeque<Option<String>>>,
    systems: Mutex<Vec<String>>,
    messages: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    fn replying(replies: &[&str]) -> Arc<Self> {
        let llm = Self::default();
        llm.replies
            .lock()
            .unwrap()
            .extend(replies.iter().map(|r| Some(r.to_string())));
        Arc::new(llm)
    }

    fn fail_next(&self) {
        self.replies.lock().unwrap().push_back(None);
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.systems.lock().unwrap().push(system.to_string());
        self.messages.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(Some(reply)) => Ok(reply),
            _ => Err(LlmError::Api {
                status: 401,
                message: "invalid x-api-key".to_string(),
            }),
        }
    }
}

struct StaticSource {
    ids: Vec<String>,
}

#[async_trait]
impl SequenceSource for StaticSource {
    async fn search(&self, _query: &SearchQuery) -> Result<SearchHits, ToolError> {
        Ok(SearchHits {
            identifiers: self.ids.clone(),
            reference_url: "https://rnacentral.org/search?q=test".to_string(),
        })
    }

    async fn fetch_records(&self, identifiers: &[String]) -> Result<Vec<Value>, ToolError> {
        Ok(identifiers
            .iter()
            .map(|id| json!({"rnacentral_id": id, "sequence": "GCAUCCGUAGCUCAGCUGG"}))
            .collect())
    }
}

async fn app(llm: Arc<ScriptedLlm>, ids: &[&str]) -> Router {
    let tools = Arc::new(ToolRegistry::new());
    let source = Arc::new(StaticSource {
        ids: ids.iter().map(|s| s.to_string()).collect(),
    });
    tools
        .register(FETCH_TRNA_SEQUENCES, Arc::new(TrnaSequenceTool::new(source)))
        .await;
    let state = Arc::new(AppState::new(Config::new("test-key".to_string()), llm, tools));
    router(state)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn plain_chat_returns_reply_with_null_tool_fields() {
    let llm = ScriptedLlm::replying(&["tRNAs decode codons."]);
    let app = app(llm.clone(), &[]).await;

    let (status, body) = post(&app, "/api/chat", json!({"message": "What is a tRNA?"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chatbot_response"], "tRNAs decode codons.");
    assert_eq!(body["api_data"], Value::Null);
    assert_eq!(body["full_results_url"], Value::Null);
    assert_eq!(body["session_id"], "default");
    assert!(llm.systems.lock().unwrap()[0].contains("Current response mode: intermediate."));
}

#[tokio::test]
async fn missing_message_is_rejected_without_calling_the_model() {
    let llm = ScriptedLlm::replying(&[]);
    let app = app(llm.clone(), &[]).await;

    let (status, body) = post(&app, "/api/chat", json!({"response_mode": "expert"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No message provided");

    let (status, _) = post(&app, "/api/chat", json!({"message": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(llm.systems.lock().unwrap().is_empty());
}

#[tokio::test]
async fn tool_turn_returns_records_and_link() {
    let llm = ScriptedLlm::replying(&[
        "FETCH_TRNA_SEQUENCES amino_acid:\"Glu\" num_sequences:\"2\"",
        "Two tRNA-Glu genes, URS1 and URS2.",
    ]);
    let app = app(llm.clone(), &["URS1", "URS2", "URS3"]).await;

    let (status, body) = post(
        &app,
        "/api/chat",
        json!({"message": "two glu tRNAs", "response_mode": "expert"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chatbot_response"], "Two tRNA-Glu genes, URS1 and URS2.");
    assert_eq!(body["api_data"].as_array().unwrap().len(), 2);
    assert_eq!(body["api_data"][1]["rnacentral_id"], "URS2");
    assert_eq!(body["full_results_url"], "https://rnacentral.org/search?q=test");
}

#[tokio::test]
async fn empty_search_returns_canned_reply() {
    let llm = ScriptedLlm::replying(&["FETCH_TRNA_SEQUENCES amino_acid:\"Xaa\""]);
    let app = app(llm.clone(), &[]).await;

    let (status, body) = post(&app, "/api/chat", json!({"message": "odd tRNAs"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "chatbot_response": "No search results found for the given query.",
            "api_data": null,
            "full_results_url": null,
            "session_id": "default",
        })
    );
    assert_eq!(llm.systems.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn upstream_failure_is_generic() {
    let llm = ScriptedLlm::replying(&[]);
    llm.fail_next();
    let app = app(llm, &[]).await;

    let (status, body) = post(&app, "/api/chat", json!({"message": "hello"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error = body["error"].as_str().unwrap();
    assert!(!error.contains("x-api-key"));
}

#[tokio::test]
async fn feedback_and_clear_endpoints_shape_the_next_turn() {
    let llm = ScriptedLlm::replying(&["a1", "a2"]);
    let app = app(llm.clone(), &[]).await;

    let (status, body) = post(&app, "/api/feedback", json!({"feedback": "x"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Feedback added successfully");
    post(&app, "/api/feedback", json!({"feedback": "y"})).await;

    let (status, _) = post(&app, "/api/feedback", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    post(&app, "/api/chat", json!({"message": "q1"})).await;

    let (status, body) = post(&app, "/api/clear_history", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Chat history cleared successfully");
    let (_, body) = post(&app, "/api/clear_feedback", json!({})).await;
    assert_eq!(body["message"], "Feedback cleared successfully");

    post(&app, "/api/chat", json!({"message": "q2"})).await;

    let systems = llm.systems.lock().unwrap().clone();
    assert!(systems[0].ends_with("User Feedback:\nx\ny"));
    assert!(!systems[1].contains("User Feedback:"));

    let messages = llm.messages.lock().unwrap().clone();
    assert_eq!(messages[1], vec![ChatMessage::user("q2")]);
}

#[tokio::test]
async fn sessions_are_isolated() {
    let llm = ScriptedLlm::replying(&["for alice", "for bob"]);
    let app = app(llm.clone(), &[]).await;

    let (_, created) = post(&app, "/api/sessions", json!({})).await;
    let alice = created["session_id"].as_str().unwrap().to_string();

    post(&app, "/api/chat", json!({"message": "hi", "session_id": alice})).await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .header("x-session-id", "bob")
        .body(Body::from(json!({"message": "hey"}).to_string()))
        .unwrap();
    let (_, body) = send(&app, request).await;
    assert_eq!(body["session_id"], "bob");

    let (status, history) = get(&app, &format!("/api/history?session_id={}", alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        history["turns"],
        json!([
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "for alice"},
        ])
    );

    let messages = llm.messages.lock().unwrap().clone();
    assert_eq!(messages[1], vec![ChatMessage::user("hey")]);

    let (status, _) = get(&app, "/api/history?session_id=nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_and_health_endpoints_respond() {
    let app = app(ScriptedLlm::replying(&[]), &[]).await;

    let (status, body) = get(&app, "/api/test").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Hello from the test endpoint");

    let (status, body) = get(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn clear_with_non_json_body_is_rejected_and_clears_nothing() {
    let llm = ScriptedLlm::replying(&["ok", "ok"]);
    let app = app(llm, &[]).await;

    post(&app, "/api/chat", json!({"message": "hi", "session_id": "abc"})).await;
    post(&app, "/api/chat", json!({"message": "hi"})).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/clear_history")
        .body(Body::from(json!({"session_id": "abc"}).to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, "/api/clear_feedback", json!({"session_id": 7})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, abc) = get(&app, "/api/history?session_id=abc").await;
    let (_, default) = get(&app, "/api/history").await;
    assert_eq!(abc["turns"].as_array().unwrap().len(), 2);
    assert_eq!(default["turns"].as_array().unwrap().len(), 2);

    let request = Request::builder()
        .method("POST")
        .uri("/api/clear_history")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let (_, abc) = get(&app, "/api/history?session_id=abc").await;
    let (_, default) = get(&app, "/api/history").await;
    assert_eq!(abc["turns"].as_array().unwrap().len(), 2);
    assert_eq!(default["turns"], json!([]));
}
