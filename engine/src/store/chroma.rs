//! Chroma vector store
//!
//! Queries a Chroma server over its REST API. The collection name from the
//! configuration is resolved to Chroma's collection id on first use and
//! cached for the lifetime of the store.
//!
//! Chroma reports distances, so results rank in ascending score order.
//! A document's id is taken from its `id` metadata field when present
//! (the ingestion pipeline writes `source:page:chunk` there), falling back
//! to Chroma's own record id.

use async_trait::async_trait;
use reqwest::Client;
use sdk::types::{RetrievedDocument, ScoreOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::{map_request_error, Embedder, Result, StoreError, VectorStore};
use crate::config::StoreConfig;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Chroma-backed vector store
pub struct ChromaStore {
    base_url: String,
    collection: String,
    collection_id: OnceCell<String>,
    embedder: Arc<dyn Embedder>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest {
    query_embeddings: Vec<Vec<f32>>,
    n_results: usize,
    include: [&'static str; 3],
}

type Metadata = HashMap<String, serde_json::Value>;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl ChromaStore {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            collection_id: OnceCell::new(),
            embedder,
            client,
        }
    }

    pub fn from_config(config: &StoreConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self::new(&config.base_url, &config.collection, embedder)
    }

    /// Confirm the configured collection exists
    pub async fn check_collection(&self) -> Result<()> {
        self.collection_id().await.map(|_| ())
    }

    async fn collection_id(&self) -> Result<&str> {
        let id = self
            .collection_id
            .get_or_try_init(|| self.resolve_collection_id())
            .await?;
        Ok(id.as_str())
    }

    async fn resolve_collection_id(&self) -> Result<String> {
        let url = format!("{}/api/v1/collections/{}", self.base_url, self.collection);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| map_request_error(e, "Chroma", &self.base_url))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(StoreError::CollectionNotFound(self.collection.clone()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::Unavailable(format!(
                "Chroma API error ({}): {}",
                status, error_text
            )));
        }

        let info: CollectionInfo = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(format!("Failed to parse collection: {}", e)))?;

        tracing::debug!("Resolved Chroma collection '{}' to {}", self.collection, info.id);
        Ok(info.id)
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    fn name(&self) -> &str {
        "chroma"
    }

    fn score_order(&self) -> ScoreOrder {
        ScoreOrder::AscendingDistance
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>> {
        let embedding = self.embedder.embed(query).await?;
        let collection_id = self.collection_id().await?;
        let url = format!("{}/api/v1/collections/{}/query", self.base_url, collection_id);

        let request = QueryRequest {
            query_embeddings: vec![embedding],
            n_results: k,
            include: ["documents", "metadatas", "distances"],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error(e, "Chroma", &self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::Unavailable(format!(
                "Chroma query error ({}): {}",
                status, error_text
            )));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(format!("Failed to parse query result: {}", e)))?;

        let documents = body.into_documents();
        tracing::debug!("Chroma returned {} documents for '{}'", documents.len(), query);
        Ok(documents)
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/api/v1/heartbeat", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Chroma health check failed: {}", e);
                false
            }
        }
    }
}

impl QueryResponse {
    /// Flatten the first (only) query's columns into documents
    fn into_documents(self) -> Vec<RetrievedDocument> {
        let ids = self.ids.into_iter().next().unwrap_or_default();
        let mut contents = first_row(self.documents).into_iter();
        let mut metadatas = first_row(self.metadatas).into_iter();
        let mut distances = first_row(self.distances).into_iter();

        ids.into_iter()
            .map(|chroma_id| {
                let content = contents.next().flatten().unwrap_or_default();
                let metadata = metadatas.next().flatten();
                let score = distances.next().flatten().unwrap_or(f64::INFINITY);

                let id = metadata
                    .as_ref()
                    .and_then(|m| m.get("id"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or(chroma_id);

                RetrievedDocument::new(id, score, content)
            })
            .collect()
    }
}

fn first_row<T>(column: Option<Vec<Vec<T>>>) -> Vec<T> {
    column
        .and_then(|rows| rows.into_iter().next())
        .unwrap_or_default()
}
