//! Turn error taxonomy
//!
//! Each component of a turn has its own failure type; `TurnError` wraps
//! whichever one ended the turn and keeps it reachable through `source()`.

use sdk::errors::ErrorExt;
use thiserror::Error;

use crate::llm::LLMError;
use crate::store::StoreError;

/// The router could not produce a valid plan
#[derive(Debug, Error)]
pub enum RoutingFailure {
    #[error("routing call failed")]
    Provider(#[source] LLMError),

    #[error("routing reply did not match the plan schema: {0}")]
    Schema(String),

    #[error("plan is empty")]
    EmptyPlan,

    #[error("plan has {len} instructions, limit is {max}")]
    TooManyInstructions { len: usize, max: usize },

    #[error("plan has {run} consecutive searches, limit is {max}")]
    TooManyConsecutiveSearches { run: usize, max: usize },

    #[error("generate instruction at position {index} is not last")]
    GenerateNotLast { index: usize },

    #[error("plan does not end with a generate instruction")]
    MissingGenerate,
}

/// The query transformer could not produce a search string
#[derive(Debug, Error)]
pub enum QueryTransformFailure {
    #[error("query transformation call failed")]
    Provider(#[source] LLMError),

    #[error("query reply did not match the expected schema: {0}")]
    Schema(String),
}

impl From<LLMError> for QueryTransformFailure {
    fn from(error: LLMError) -> Self {
        match error {
            LLMError::ParseError(msg) => QueryTransformFailure::Schema(msg),
            other => QueryTransformFailure::Provider(other),
        }
    }
}

impl From<LLMError> for RoutingFailure {
    fn from(error: LLMError) -> Self {
        match error {
            LLMError::ParseError(msg) => RoutingFailure::Schema(msg),
            other => RoutingFailure::Provider(other),
        }
    }
}

/// Why a turn ended without an answer
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("routing failed")]
    Routing(#[source] RoutingFailure),

    #[error("could not turn '{suggestion}' into a search query")]
    QueryTransform {
        suggestion: String,
        #[source]
        source: QueryTransformFailure,
    },

    #[error("document search for '{query}' failed")]
    Retrieval {
        query: String,
        #[source]
        source: StoreError,
    },

    #[error("response generation failed")]
    Generation {
        #[source]
        source: LLMError,
    },
}

impl ErrorExt for TurnError {
    fn user_hint(&self) -> &str {
        match self {
            TurnError::Routing(_) => "Could not decide how to answer. Please try again.",
            TurnError::QueryTransform { .. } => {
                "Could not prepare a document search. Try rephrasing your question."
            }
            TurnError::Retrieval { source, .. } => match source {
                StoreError::CollectionNotFound(_) => {
                    "The document collection does not exist. Check [store] collection in the config."
                }
                StoreError::Embedding(_) => {
                    "Could not embed the search query. Is the embedding model pulled in Ollama?"
                }
                _ => "The document store is unavailable. Is Chroma running?",
            },
            TurnError::Generation { source } => match source {
                LLMError::Timeout => "The model took too long to answer. Please try again.",
                _ => "The model failed while answering. Is Ollama running?",
            },
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            TurnError::Retrieval {
                source: StoreError::CollectionNotFound(_),
                ..
            }
        )
    }
}
