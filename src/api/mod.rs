//! HTTP API for the tRNA assistant.
//!
//! Thin plumbing over [`crate::agent::Chatbot`]: request parsing, per-conversation
//! session lookup and JSON responses.

mod routes;
mod sessions;
pub mod types;

pub use routes::{router, serve, ApiError, AppState, SESSION_HEADER};
pub use sessions::{is_valid_session_id, SessionStore};
