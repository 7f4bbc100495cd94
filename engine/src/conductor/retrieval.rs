//! Retrieval Executor
//!
//! Runs one similarity search, ranks and bounds the result, and records the
//! search in the history log. A failed search leaves the log untouched.

use sdk::types::RetrievedDocument;
use std::sync::Arc;

use crate::history::{self, HistoryEntry, HistoryLog};
use crate::store::{StoreError, VectorStore};

/// Hard cap on documents returned by one search
pub const MAX_RETRIEVAL_RESULTS: usize = 5;

pub struct RetrievalExecutor {
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl RetrievalExecutor {
    /// `top_k` is clamped to `1..=MAX_RETRIEVAL_RESULTS`
    pub fn new(store: Arc<dyn VectorStore>, top_k: usize) -> Self {
        Self {
            store,
            top_k: top_k.clamp(1, MAX_RETRIEVAL_RESULTS),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Search for `query` and append a `QueryTurn` with the result text
    pub async fn execute(
        &self,
        query: &str,
        history: &mut HistoryLog,
    ) -> Result<Vec<RetrievedDocument>, StoreError> {
        let mut documents = self.store.similarity_search(query, self.top_k).await?;

        let order = self.store.score_order();
        documents.sort_by(|a, b| order.compare(a.score, b.score));
        documents.truncate(self.top_k);

        let text = history::result_text(documents.iter().map(|d| d.content.as_str()));
        history.append(HistoryEntry::query(query, text));

        tracing::info!(
            "Search '{}' on {} returned {} documents",
            query,
            self.store.name(),
            documents.len()
        );
        Ok(documents)
    }
}
