//! Router
//!
//! Makes the one routing call of a turn: shows the model the conversation and
//! asks for a plan. Anything short of a valid plan is replaced by the fallback
//! plan, so the orchestrator always has something to run.

use serde::Deserialize;
use std::sync::Arc;

use super::error::RoutingFailure;
use super::prompts;
use super::types::{Instruction, Plan, PlanLimits};
use crate::history::{HistoryLog, RenderMode};
use crate::llm::{parse_json_reply, LLMProvider, ResponseFormat};

/// Shape of the routing reply
#[derive(Debug, Deserialize)]
struct RawPlan {
    plan: Vec<Instruction>,
}

/// Outcome of routing: the plan to run, and why the fallback was used if it was
#[derive(Debug)]
pub struct RoutedPlan {
    pub plan: Plan,
    pub failure: Option<RoutingFailure>,
}

impl RoutedPlan {
    pub fn is_fallback(&self) -> bool {
        self.failure.is_some()
    }
}

pub struct Router {
    llm: Arc<dyn LLMProvider>,
    limits: PlanLimits,
}

impl Router {
    pub fn new(llm: Arc<dyn LLMProvider>, limits: PlanLimits) -> Self {
        Self { llm, limits }
    }

    /// Ask the model for a plan and validate it
    pub async fn try_route(&self, history: &HistoryLog) -> Result<Plan, RoutingFailure> {
        let prompt = prompts::routing_prompt(
            &history.render(RenderMode::Helper),
            self.limits.max_instructions,
            self.limits.max_consecutive_searches,
        );

        let reply = self.llm.complete(&prompt, ResponseFormat::Json).await?;
        let raw: RawPlan = parse_json_reply(&reply)?;

        Plan::new(raw.plan, &self.limits)
    }

    /// Route the turn, substituting the fallback plan on any failure
    pub async fn route(&self, history: &HistoryLog) -> RoutedPlan {
        match self.try_route(history).await {
            Ok(plan) => {
                tracing::info!("Routed plan {} ({} searches)", plan, plan.search_count());
                RoutedPlan {
                    plan,
                    failure: None,
                }
            }
            Err(failure) => {
                tracing::warn!("Routing failed, using fallback plan: {}", failure);
                RoutedPlan {
                    plan: Plan::fallback(),
                    failure: Some(failure),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductor::testing::ScriptedProvider;
    use crate::conductor::types::FALLBACK_SUGGESTION;
    use crate::history::HistoryEntry;
    use crate::llm::LLMError;

    fn history() -> HistoryLog {
        let mut log = HistoryLog::new();
        log.append(HistoryEntry::user("what is the refund window?"));
        log.append(HistoryEntry::assistant("30 days"));
        log
    }

    #[tokio::test]
    async fn test_route_valid_plan() {
        let llm = Arc::new(ScriptedProvider::new().reply(
            r#"{"plan": [{"action": "document_search", "suggestion": "refund window"},
                         {"action": "generate", "suggestion": "state the window"}]}"#,
        ));
        let router = Router::new(Arc::clone(&llm) as Arc<dyn LLMProvider>, PlanLimits::default());

        let routed = router.route(&history()).await;
        assert!(!routed.is_fallback());
        assert_eq!(
            routed.plan.instructions(),
            &[
                Instruction::search("refund window"),
                Instruction::generate("state the window")
            ]
        );

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("--- Previous response"));
        assert!(!prompts[0].contains("--- Assistant"));
    }

    #[tokio::test]
    async fn test_route_falls_back_on_provider_error() {
        let llm = Arc::new(ScriptedProvider::new().fail(LLMError::Timeout));
        let router = Router::new(llm, PlanLimits::default());

        let routed = router.route(&history()).await;
        assert!(matches!(routed.failure, Some(RoutingFailure::Provider(LLMError::Timeout))));
        assert_eq!(routed.plan.instructions(), &[Instruction::generate(FALLBACK_SUGGESTION)]);
    }

    #[tokio::test]
    async fn test_route_falls_back_on_schema_mismatch() {
        let llm = Arc::new(ScriptedProvider::new().reply(r#"{"choice": "document_search"}"#));
        let router = Router::new(llm, PlanLimits::default());

        let routed = router.route(&history()).await;
        assert!(matches!(routed.failure, Some(RoutingFailure::Schema(_))));
        assert_eq!(routed.plan, Plan::fallback());
    }

    #[tokio::test]
    async fn test_route_falls_back_on_unknown_action() {
        let llm = Arc::new(
            ScriptedProvider::new().reply(r#"{"plan": [{"action": "web_search", "suggestion": "x"}]}"#),
        );
        let router = Router::new(llm, PlanLimits::default());

        assert!(router.route(&history()).await.is_fallback());
    }

    #[tokio::test]
    async fn test_route_falls_back_on_limit_violation() {
        let llm = Arc::new(ScriptedProvider::new().reply(
            r#"{"plan": [{"action": "document_search", "suggestion": "a"},
                         {"action": "document_search", "suggestion": "b"},
                         {"action": "generate", "suggestion": "answer"}]}"#,
        ));
        let router = Router::new(
            llm,
            PlanLimits {
                max_instructions: 6,
                max_consecutive_searches: 1,
            },
        );

        let routed = router.route(&history()).await;
        assert!(matches!(
            routed.failure,
            Some(RoutingFailure::TooManyConsecutiveSearches { run: 2, max: 1 })
        ));
        assert_eq!(routed.plan, Plan::fallback());
    }

    #[tokio::test]
    async fn test_try_route_reports_missing_generate() {
        let llm = Arc::new(ScriptedProvider::new().reply(
            r#"{"plan": [{"action": "document_search", "suggestion": "a"}]}"#,
        ));
        let router = Router::new(llm, PlanLimits::default());

        assert!(matches!(
            router.try_route(&history()).await,
            Err(RoutingFailure::MissingGenerate)
        ));
    }
}
