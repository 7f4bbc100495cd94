//! Vector Store Abstraction Layer
//!
//! The retrieval executor only needs one operation from a store: return the
//! `k` documents closest to a query, best match first. Stores differ in how
//! they score matches, so each one reports its `ScoreOrder` and the caller
//! ranks results with it.
//!
//! `ChromaStore` talks to a Chroma server over REST and embeds queries with
//! an `Embedder` (Ollama by default).

use async_trait::async_trait;
use sdk::types::{RetrievedDocument, ScoreOrder};

pub mod chroma;
pub mod embedder;

pub use chroma::ChromaStore;
pub use embedder::OllamaEmbedder;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while querying a vector store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    Parse(String),
}

/// A semantic document store
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Returns the name of the store (e.g., "chroma")
    fn name(&self) -> &str;

    /// How this store's scores rank documents
    fn score_order(&self) -> ScoreOrder;

    /// Return up to `k` documents matching `query`
    ///
    /// Implementations should return best match first but callers do not
    /// rely on it.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>>;

    /// Check if the store is reachable
    async fn check_health(&self) -> bool {
        true
    }
}

/// Turns query text into an embedding vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Map a reqwest transport error onto the store error taxonomy
pub(crate) fn map_request_error(e: reqwest::Error, service: &str, base_url: &str) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else if e.is_connect() {
        StoreError::Unavailable(format!("Cannot connect to {} at {}", service, base_url))
    } else {
        StoreError::Network(e.to_string())
    }
}
