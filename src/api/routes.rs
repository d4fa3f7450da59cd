//! HTTP routes and server startup.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::sessions::{is_valid_session_id, SessionStore};
use super::types::{
    ChatRequest, ChatResponse, CreateSessionResponse, ErrorResponse, FeedbackRequest,
    HealthResponse, HistoryQuery, HistoryResponse, MessageResponse, SessionRequest,
    DEFAULT_SESSION_ID,
};
use crate::agent::ChatError;
use crate::config::Config;
use crate::llm::{AnthropicClient, LlmClient};
use crate::tools::ToolRegistry;

/// Header that may carry the conversation id instead of the body.
pub const SESSION_HEADER: &str = "x-session-id";

const GENERIC_FAILURE: &str = "Failed to generate a response. Please try again.";

/// Shared state for all handlers.
pub struct AppState {
    pub config: Config,
    pub sessions: SessionStore,
    pub tools: Arc<ToolRegistry>,
}

impl AppState {
    pub fn new(config: Config, llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        let sessions = SessionStore::new(llm, Arc::clone(&tools), config.max_history_turns);
        Self {
            config,
            sessions,
            tools,
        }
    }
}

/// Errors surfaced to HTTP clients.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Upstream,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Upstream => (StatusCode::BAD_GATEWAY, GENERIC_FAILURE.to_string()),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::EmptyInput => ApiError::BadRequest("No message provided".to_string()),
            ChatError::Gateway(e) => {
                tracing::error!(error = %e, "Chat turn failed in the LLM gateway");
                ApiError::Upstream
            }
            ChatError::Tool(e) => {
                tracing::error!(error = %e, "Chat turn failed in a tool");
                ApiError::Upstream
            }
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = if state.config.dev_mode {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(SESSION_HEADER)])
    };

    Router::new()
        .route("/api/test", get(test_endpoint))
        .route("/api/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/chat", post(chat))
        .route("/api/feedback", post(add_feedback))
        .route("/api/clear_history", post(clear_history))
        .route("/api/clear_feedback", post(clear_feedback))
        .route("/api/history", get(history))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and run until it stops.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("trna-assistant/", env!("CARGO_PKG_VERSION")))
        .timeout(config.request_timeout())
        .build()?;

    let llm: Arc<dyn LlmClient> = Arc::new(AnthropicClient::new(http.clone(), config.llm.clone()));
    let tools = Arc::new(ToolRegistry::with_defaults(&config, http));
    let state = Arc::new(AppState::new(config.clone(), llm, tools));

    if config.session_idle_ttl_secs > 0 {
        spawn_session_reaper(Arc::clone(&state), config.session_idle_ttl_secs);
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn spawn_session_reaper(state: Arc<AppState>, ttl_secs: u64) {
    let ttl = std::time::Duration::from_secs(ttl_secs);
    let period = std::time::Duration::from_secs(ttl_secs.clamp(1, 60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            state.sessions.evict_idle(ttl).await;
        }
    });
}

/// Pick the conversation id from the body, then the header, then the default.
fn resolve_session_id(body: Option<&str>, headers: &HeaderMap) -> Result<String, ApiError> {
    let id = body
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or(DEFAULT_SESSION_ID);

    if is_valid_session_id(id) {
        Ok(id.to_string())
    } else {
        Err(ApiError::BadRequest("Invalid session id".to_string()))
    }
}

/// Body of the clear endpoints. An empty body targets the header or default
/// conversation; anything else must be a JSON object.
fn session_request(headers: &HeaderMap, body: &[u8]) -> Result<SessionRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SessionRequest::default());
    }

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
        .unwrap_or(false);
    if !is_json {
        return Err(ApiError::BadRequest(
            "Expected a JSON body with Content-Type: application/json".to_string(),
        ));
    }

    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session body");
        ApiError::BadRequest(format!("Invalid request body: {}", e))
    })
}

/// GET /api/test - Liveness probe kept for the frontend.
async fn test_endpoint() -> Json<MessageResponse> {
    Json(MessageResponse::new("Hello from the test endpoint"))
}

/// GET /api/health - Service status.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/sessions - Start a new conversation.
async fn create_session(State(state): State<Arc<AppState>>) -> Json<CreateSessionResponse> {
    let session_id = Uuid::new_v4().to_string();
    state.sessions.get_or_create(&session_id).await;
    Json(CreateSessionResponse { session_id })
}

/// POST /api/chat - Run one chat turn.
async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = body.map_err(|e| {
        tracing::debug!(error = %e, "Rejected chat body");
        ApiError::BadRequest("No message provided".to_string())
    })?;

    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("No message provided".to_string()))?;
    let session_id = resolve_session_id(req.session_id.as_deref(), &headers)?;

    let bot = state.sessions.get_or_create(&session_id).await;
    let result = bot.handle_turn(&message, &req.response_mode).await?;

    tracing::info!(
        session_id = %session_id,
        records = result.tool_data.as_ref().map(Vec::len).unwrap_or(0),
        "Chat turn complete"
    );
    Ok(Json(ChatResponse::new(result, session_id)))
}

/// POST /api/feedback - Append feedback to a conversation's system prompt.
async fn add_feedback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let no_feedback = || ApiError::BadRequest("No feedback provided".to_string());
    let Json(req) = body.map_err(|_| no_feedback())?;

    let feedback = req
        .feedback
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(no_feedback)?;
    let session_id = resolve_session_id(req.session_id.as_deref(), &headers)?;

    state
        .sessions
        .get_or_create(&session_id)
        .await
        .add_feedback(&feedback)
        .await;
    Ok(Json(MessageResponse::new("Feedback added successfully")))
}

/// POST /api/clear_history - Forget a conversation's history.
async fn clear_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let req = session_request(&headers, &body)?;
    let session_id = resolve_session_id(req.session_id.as_deref(), &headers)?;

    if let Some(bot) = state.sessions.get(&session_id).await {
        bot.clear_history().await;
    }
    Ok(Json(MessageResponse::new("Chat history cleared successfully")))
}

/// POST /api/clear_feedback - Forget a conversation's feedback.
async fn clear_feedback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let req = session_request(&headers, &body)?;
    let session_id = resolve_session_id(req.session_id.as_deref(), &headers)?;

    if let Some(bot) = state.sessions.get(&session_id).await {
        bot.clear_feedback().await;
    }
    Ok(Json(MessageResponse::new("Feedback cleared successfully")))
}

/// GET /api/history - Stored turns and feedback of a conversation.
async fn history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session_id = resolve_session_id(query.session_id.as_deref(), &headers)?;
    let bot = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Unknown session: {}", session_id)))?;

    Ok(Json(HistoryResponse {
        session_id,
        turns: bot.history().await,
        feedback: bot.feedback().await,
        created_at: bot.created_at().to_rfc3339(),
    }))
}
