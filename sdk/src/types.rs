//! Retrieval types
//!
//! Documents returned by a vector store and the ordering convention of
//! their scores.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A document returned by a similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Source identifier (e.g. `data/handbook.pdf:3:2`)
    pub id: String,

    /// Similarity score or distance, interpreted per the store's `ScoreOrder`
    pub score: f64,

    /// Chunk text
    pub content: String,
}

impl RetrievedDocument {
    /// Create a new retrieved document
    pub fn new(id: impl Into<String>, score: f64, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            score,
            content: content.into(),
        }
    }

    /// Citation line for this document: two-decimal score, a tab, the id
    pub fn citation(&self) -> String {
        format!("{:.2}\t{}", self.score, self.id)
    }
}

/// How a store's scores rank documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrder {
    /// Lower is better (distance metrics such as L2 or cosine distance)
    AscendingDistance,

    /// Higher is better (similarity metrics such as cosine similarity)
    DescendingSimilarity,
}

impl ScoreOrder {
    /// Compare two scores so that the better match sorts first
    pub fn compare(&self, a: f64, b: f64) -> Ordering {
        let ord = a.total_cmp(&b);
        match self {
            ScoreOrder::AscendingDistance => ord,
            ScoreOrder::DescendingSimilarity => ord.reverse(),
        }
    }

    /// Returns true if `docs` is ordered best match first
    pub fn is_ranked(&self, docs: &[RetrievedDocument]) -> bool {
        docs.windows(2)
            .all(|pair| self.compare(pair[0].score, pair[1].score) != Ordering::Greater)
    }
}
