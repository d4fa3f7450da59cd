//! Agent module - the conversational core.
//!
//! Each user turn:
//! 1. Build the system prompt (response mode + feedback) and message sequence
//! 2. Call the LLM
//! 3. If the reply contains a tool trigger, run that tool, which feeds its
//!    data back to the LLM for a second reply
//! 4. Record the exchange in the conversation history

mod agent_loop;
pub mod prompt;
pub mod state;

pub use agent_loop::{ChatError, Chatbot, TurnResult};
pub use prompt::{build_messages, build_system_prompt};
pub use state::{ConversationState, FeedbackStore};
