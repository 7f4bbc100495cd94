//! Query Transformer
//!
//! Turns a routing suggestion into a short search string.

use serde::Deserialize;
use std::sync::Arc;

use super::error::QueryTransformFailure;
use super::prompts;
use crate::history::{HistoryLog, RenderMode};
use crate::llm::{parse_json_reply, LLMProvider, ResponseFormat};

#[derive(Debug, Deserialize)]
struct QueryReply {
    query: String,
}

pub struct QueryTransformer {
    llm: Arc<dyn LLMProvider>,
}

impl QueryTransformer {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self { llm }
    }

    /// Produce the search string for `suggestion`
    ///
    /// The model's `query` field is returned exactly as given.
    pub async fn transform(
        &self,
        suggestion: &str,
        history: &HistoryLog,
    ) -> Result<String, QueryTransformFailure> {
        let prompt = prompts::query_prompt(&history.render(RenderMode::Helper), suggestion);
        let reply = self.llm.complete(&prompt, ResponseFormat::Json).await?;
        let parsed: QueryReply = parse_json_reply(&reply)?;

        tracing::debug!("Transformed '{}' into query '{}'", suggestion, parsed.query);
        Ok(parsed.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductor::testing::ScriptedProvider;
    use crate::llm::LLMError;

    #[tokio::test]
    async fn test_transform_returns_query_verbatim() {
        let llm = Arc::new(ScriptedProvider::new().reply(r#"{"query": "  Refund WINDOW policy  "}"#));
        let transformer = QueryTransformer::new(Arc::clone(&llm) as Arc<dyn LLMProvider>);

        let query = transformer
            .transform("find the refund window", &HistoryLog::new())
            .await
            .unwrap();
        assert_eq!(query, "  Refund WINDOW policy  ");
        assert!(llm.prompts()[0].contains("Search goal: find the refund window"));
    }

    #[tokio::test]
    async fn test_transform_schema_failure() {
        let llm = Arc::new(ScriptedProvider::new().reply(r#"{"queries": ["a", "b"]}"#));
        let transformer = QueryTransformer::new(llm);

        let result = transformer.transform("anything", &HistoryLog::new()).await;
        assert!(matches!(result, Err(QueryTransformFailure::Schema(_))));
    }

    #[tokio::test]
    async fn test_transform_provider_failure() {
        let llm = Arc::new(
            ScriptedProvider::new().fail(LLMError::ProviderUnavailable("down".into())),
        );
        let transformer = QueryTransformer::new(llm);

        let result = transformer.transform("anything", &HistoryLog::new()).await;
        assert!(matches!(
            result,
            Err(QueryTransformFailure::Provider(LLMError::ProviderUnavailable(_)))
        ));
    }
}
