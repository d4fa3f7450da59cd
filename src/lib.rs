//! # tRNA Assistant
//!
//! A conversational assistant for tRNA researchers, answering questions with
//! an LLM and pulling real sequences from RNAcentral/GtRNAdb on demand.
//!
//! This library provides:
//! - An HTTP API for chat turns, feedback and conversation resets
//! - A turn loop that lets the model request a sequence lookup
//! - Integration with Anthropic's Messages API for LLM access
//!
//! ## Architecture
//!
//! Each turn follows a "one tool, at most" pattern:
//! 1. Receive a message via the API
//! 2. Build the system prompt (response mode + feedback) and the conversation so far
//! 3. Call the LLM; if the reply carries a tool trigger, run that tool
//! 4. Feed the tool's records back to the LLM for the final reply
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trna_assistant::{agent::Chatbot, llm::AnthropicClient, tools::ToolRegistry, Config};
//!
//! let config = Config::from_env()?;
//! let http = reqwest::Client::new();
//! let llm = Arc::new(AnthropicClient::new(http.clone(), config.llm.clone()));
//! let tools = Arc::new(ToolRegistry::with_defaults(&config, http));
//! let bot = Chatbot::new(llm, tools, config.max_history_turns);
//! let result = bot.handle_turn("Show me a human tRNA-Glu", "beginner").await?;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod tools;

#[cfg(test)]
mod test_support;

pub use config::Config;
