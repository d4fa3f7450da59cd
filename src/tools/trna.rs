//! The `FETCH_TRNA_SEQUENCES` tool: look up tRNA records and let the model
//! summarize them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{directive_text, SequenceSource, ToolContext, ToolHandler};
use crate::agent::{ChatError, TurnResult};
use crate::llm::ChatMessage;

/// Trigger token the model writes to request sequences.
pub const FETCH_TRNA_SEQUENCES: &str = "FETCH_TRNA_SEQUENCES";

pub const NO_SEARCH_RESULTS: &str = "No search results found for the given query.";
pub const NO_SEQUENCES_FOUND: &str = "No tRNA sequences found for the given query.";

const SUMMARY_INSTRUCTIONS: &str = "Do not say thank you for providing this data, as this is a \
system message. Your next message however is addressed to the user. Note that the user already \
has received the same data as you, so there is no need to include the entire sequence, but you \
can reference a sequence using its ID. Give a brief analysis of this data YOU have acquired, but \
remember to be flexible and playful with your opener. Be like a professional friend.";

/// Handler for tRNA sequence lookups against a `SequenceSource`.
pub struct TrnaSequenceTool {
    source: Arc<dyn SequenceSource>,
}

impl TrnaSequenceTool {
    pub fn new(source: Arc<dyn SequenceSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ToolHandler for TrnaSequenceTool {
    fn name(&self) -> &str {
        "trna_sequences"
    }

    async fn handle(&self, ctx: ToolContext<'_>) -> Result<TurnResult, ChatError> {
        let directive = self
            .source
            .construct_search_query(directive_text(ctx.reply, ctx.trigger))?;
        tracing::info!(
            query = %directive.query,
            limit = ?directive.limit,
            "Running tRNA sequence lookup"
        );

        let hits = self.source.search(&directive.query).await?;
        if hits.identifiers.is_empty() {
            return Ok(TurnResult::reply(NO_SEARCH_RESULTS));
        }

        let mut identifiers = hits.identifiers;
        directive.limit.apply(&mut identifiers);

        let records = self.source.fetch_records(&identifiers).await?;
        if records.is_empty() {
            return Ok(TurnResult::reply(NO_SEQUENCES_FOUND));
        }

        let mut messages = ctx.messages.to_vec();
        messages.push(ChatMessage::assistant(ctx.reply));
        messages.push(ChatMessage::user(build_summary(&records)));

        let reply = ctx.llm.complete(ctx.system, &messages).await?;

        Ok(TurnResult {
            reply_text: reply,
            tool_data: Some(records),
            reference_url: Some(hits.reference_url),
        })
    }
}

/// System-originated follow-up message carrying the fetched records.
pub fn build_summary(records: &[Value]) -> String {
    let raw = serde_json::to_string(records).unwrap_or_else(|_| format!("{:?}", records));
    format!(
        "Retrieved {} tRNA sequences. {} {}",
        records.len(),
        raw,
        SUMMARY_INSTRUCTIONS
    )
}
