//! Response Generator
//!
//! Streams the final answer. Chunks are forwarded to the caller as they
//! arrive; the history log only changes once the whole answer is in.

use futures::StreamExt;
use sdk::types::RetrievedDocument;
use std::sync::Arc;

use super::events::{emit, EventSink, TurnEvent};
use super::prompts;
use crate::history::{HistoryEntry, HistoryLog, RenderMode};
use crate::llm::{LLMError, LLMProvider};

/// A completed answer and its citations
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub text: String,
    pub sources: Vec<String>,
}

pub struct ResponseGenerator {
    llm: Arc<dyn LLMProvider>,
}

impl ResponseGenerator {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self { llm }
    }

    /// Generate the answer from the conversation and the documents gathered
    /// by this turn's searches
    ///
    /// On success appends an `AssistantTurn` and emits `Sources` when there
    /// is at least one document. On failure the history log is unchanged,
    /// although chunks already emitted stay emitted.
    pub async fn generate(
        &self,
        history: &mut HistoryLog,
        suggestion: Option<&str>,
        documents: &[RetrievedDocument],
        events: &EventSink,
    ) -> Result<GeneratedAnswer, LLMError> {
        let prompt = prompts::response_prompt(
            &history.render(RenderMode::Conversation),
            suggestion,
            documents,
        );

        let mut stream = self.llm.stream(&prompt).await?;
        let mut text = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            text.push_str(&chunk);
            emit(events, TurnEvent::Chunk(chunk));
        }

        history.append(HistoryEntry::assistant(text.clone()));

        let sources: Vec<String> = documents.iter().map(RetrievedDocument::citation).collect();
        if !sources.is_empty() {
            emit(events, TurnEvent::Sources(sources.clone()));
        }

        tracing::info!(
            "Generated answer ({} chars, {} sources)",
            text.len(),
            sources.len()
        );
        Ok(GeneratedAnswer { text, sources })
    }
}
