//! Turn Orchestrator
//!
//! Drives a single user turn:
//!
//! 1. Record the user's message.
//! 2. Route once to obtain a plan (the fallback plan if routing fails).
//! 3. Run the plan in order. A search transforms its suggestion into a query
//!    and retrieves documents; a failed search abandons the rest of the plan.
//!    The final generate step answers from everything gathered so far.
//!
//! The history log is owned by the caller and lent to the turn. Entries
//! committed before a failure or an interrupt stay in the log.

use sdk::types::RetrievedDocument;
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use super::error::{RoutingFailure, TurnError};
use super::events::{emit, EventSink, TurnEvent, TurnState};
use super::generator::ResponseGenerator;
use super::query::QueryTransformer;
use super::retrieval::RetrievalExecutor;
use super::router::Router;
use super::types::{InstructionKind, Plan, PlanLimits};
use crate::history::{HistoryEntry, HistoryLog};
use crate::llm::LLMProvider;
use crate::store::VectorStore;

/// Result of a turn that produced an answer
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub plan: Plan,
    pub answer: String,
    pub sources: Vec<String>,
    pub searches: usize,
    pub routing_fallback: bool,
}

/// Mutable state of one turn: the borrowed log and the documents gathered
/// by the plan's searches so far
pub struct TurnSession<'a> {
    history: &'a mut HistoryLog,
    documents: Vec<RetrievedDocument>,
    searches: usize,
}

impl<'a> TurnSession<'a> {
    pub fn new(history: &'a mut HistoryLog) -> Self {
        Self {
            history,
            documents: Vec::new(),
            searches: 0,
        }
    }

    pub fn history(&self) -> &HistoryLog {
        &*self.history
    }
}

pub struct TurnOrchestrator {
    router: Router,
    transformer: QueryTransformer,
    retrieval: RetrievalExecutor,
    generator: ResponseGenerator,
}

impl TurnOrchestrator {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        store: Arc<dyn VectorStore>,
        limits: PlanLimits,
        top_k: usize,
    ) -> Self {
        Self {
            router: Router::new(Arc::clone(&llm), limits),
            transformer: QueryTransformer::new(Arc::clone(&llm)),
            retrieval: RetrievalExecutor::new(store, top_k),
            generator: ResponseGenerator::new(llm),
        }
    }

    /// Run one turn for `input`
    ///
    /// Progress is reported on `events`. Returns the answer, or the error
    /// that ended the turn; in both cases the orchestrator is back in `Idle`.
    pub async fn run_turn(
        &self,
        history: &mut HistoryLog,
        input: &str,
        events: &EventSink,
    ) -> Result<TurnOutcome, TurnError> {
        let span = tracing::info_span!("turn", id = %Uuid::new_v4());

        async move {
            let result = self.drive(TurnSession::new(history), input, events).await;

            if let Err(e) = &result {
                tracing::warn!("Turn aborted: {}", e);
                transition(events, TurnState::Errored);
            }
            transition(events, TurnState::Idle);
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        mut session: TurnSession<'_>,
        input: &str,
        events: &EventSink,
    ) -> Result<TurnOutcome, TurnError> {
        session.history.append(HistoryEntry::user(input));

        transition(events, TurnState::Routing);
        let routed = self.router.route(session.history()).await;
        let routing_fallback = routed.is_fallback();
        let plan = routed.plan;
        emit(
            events,
            TurnEvent::PlanReady {
                plan: plan.clone(),
                fallback: routing_fallback,
            },
        );

        let mut answer = None;
        for (step, instruction) in plan.instructions().iter().enumerate() {
            match instruction.kind {
                InstructionKind::DocumentSearch => {
                    transition(events, TurnState::Searching { step });
                    self.search(&mut session, &instruction.suggestion, events)
                        .await?;
                }
                InstructionKind::Generate => {
                    transition(events, TurnState::Generating { step });
                    let suggestion = Some(instruction.suggestion.as_str());
                    let generated = self
                        .generator
                        .generate(session.history, suggestion, &session.documents, events)
                        .await
                        .map_err(|source| TurnError::Generation { source })?;
                    answer = Some(generated);
                    break;
                }
            }
        }

        // Validated plans always end in Generate.
        let answer = answer.ok_or(TurnError::Routing(RoutingFailure::MissingGenerate))?;

        Ok(TurnOutcome {
            plan,
            answer: answer.text,
            sources: answer.sources,
            searches: session.searches,
            routing_fallback,
        })
    }

    async fn search(
        &self,
        session: &mut TurnSession<'_>,
        suggestion: &str,
        events: &EventSink,
    ) -> Result<(), TurnError> {
        let query = self
            .transformer
            .transform(suggestion, session.history())
            .await
            .map_err(|source| TurnError::QueryTransform {
                suggestion: suggestion.to_string(),
                source,
            })?;
        emit(
            events,
            TurnEvent::QueryPrepared {
                suggestion: suggestion.to_string(),
                query: query.clone(),
            },
        );

        let documents = self
            .retrieval
            .execute(&query, session.history)
            .await
            .map_err(|source| TurnError::Retrieval {
                query: query.clone(),
                source,
            })?;
        emit(
            events,
            TurnEvent::DocumentsRetrieved {
                query,
                count: documents.len(),
            },
        );

        session.documents.extend(documents);
        session.searches += 1;
        Ok(())
    }
}

fn transition(events: &EventSink, state: TurnState) {
    tracing::debug!("Turn state: {:?}", state);
    emit(events, TurnEvent::StateChanged(state));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductor::events;
    use crate::conductor::testing::{drain, ScriptedProvider, StaticStore};
    use crate::conductor::types::{Instruction, FALLBACK_SUGGESTION};
    use crate::history::NO_CONTEXTS_FOUND;
    use crate::llm::LLMError;
    use sdk::types::ScoreOrder;
    use std::time::Duration;

    const ONE_SEARCH_PLAN: &str = r#"{"plan": [
        {"action": "document_search", "suggestion": "refund window"},
        {"action": "generate", "suggestion": "state the window"}]}"#;

    const TWO_SEARCH_PLAN: &str = r#"{"plan": [
        {"action": "document_search", "suggestion": "refund window"},
        {"action": "document_search", "suggestion": "damaged items"},
        {"action": "generate", "suggestion": "combine both"}]}"#;

    fn doc(id: &str, score: f64, content: &str) -> RetrievedDocument {
        RetrievedDocument::new(id, score, content)
    }

    fn orchestrator(llm: ScriptedProvider, store: StaticStore) -> TurnOrchestrator {
        TurnOrchestrator::new(Arc::new(llm), Arc::new(store), PlanLimits::default(), 5)
    }

    fn kinds(log: &HistoryLog) -> Vec<&'static str> {
        log.entries()
            .iter()
            .map(|e| match e {
                HistoryEntry::UserTurn { .. } => "user",
                HistoryEntry::AssistantTurn { .. } => "assistant",
                HistoryEntry::QueryTurn { .. } => "query",
            })
            .collect()
    }

    #[tokio::test]
    async fn test_interrupt_keeps_committed_entries() {
        let llm = ScriptedProvider::new()
            .reply(ONE_SEARCH_PLAN)
            .reply(r#"{"query": "refund window"}"#)
            .stream_then_hang(&["Refunds are "]);
        let orchestrator = orchestrator(llm, StaticStore::new(ScoreOrder::AscendingDistance));
        let (tx, mut rx) = events::channel();
        let mut log = HistoryLog::new();

        let result = tokio::time::timeout(
            Duration::from_millis(200),
            orchestrator.run_turn(&mut log, "refunds?", &tx),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(
            log.entries(),
            &[
                HistoryEntry::user("refunds?"),
                HistoryEntry::query("refund window", NO_CONTEXTS_FOUND),
            ]
        );
        assert!(drain(&mut rx).contains(&TurnEvent::Chunk("Refunds are ".into())));
    }

    #[tokio::test]
    async fn test_search_then_answer() {
        let llm = ScriptedProvider::new()
            .reply(ONE_SEARCH_PLAN)
            .reply(r#"{"query": "refund window days"}"#)
            .stream(&["Refunds are accepted ", "within 30 days."]);
        let store = StaticStore::new(ScoreOrder::AscendingDistance)
            .with_results(vec![doc("data/policy.pdf:0:1", 0.21, "Refunds within 30 days")]);
        let orchestrator = orchestrator(llm, store);
        let (tx, mut rx) = events::channel();
        let mut log = HistoryLog::new();

        let outcome = orchestrator
            .run_turn(&mut log, "How long do I have to return an item?", &tx)
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Refunds are accepted within 30 days.");
        assert_eq!(outcome.sources, vec!["0.21\tdata/policy.pdf:0:1"]);
        assert_eq!(outcome.searches, 1);
        assert!(!outcome.routing_fallback);
        assert_eq!(kinds(&log), vec!["user", "query", "assistant"]);
        assert_eq!(
            log.entries()[1],
            HistoryEntry::query("refund window days", "Refunds within 30 days")
        );

        drop(tx);
        let events = drain(&mut rx);
        assert_eq!(events.first(), Some(&TurnEvent::StateChanged(TurnState::Routing)));
        assert_eq!(events.last(), Some(&TurnEvent::StateChanged(TurnState::Idle)));
        assert!(events.contains(&TurnEvent::DocumentsRetrieved {
            query: "refund window days".into(),
            count: 1
        }));
        assert!(!events.contains(&TurnEvent::StateChanged(TurnState::Errored)));
    }

    #[tokio::test]
    async fn test_store_outage_aborts_turn() {
        let llm = ScriptedProvider::new()
            .reply(ONE_SEARCH_PLAN)
            .reply(r#"{"query": "refund window"}"#)
            .stream(&["should never be generated"]);
        let orchestrator =
            orchestrator(llm, StaticStore::new(ScoreOrder::AscendingDistance).failing());
        let (tx, mut rx) = events::channel();
        let mut log = HistoryLog::new();

        let result = orchestrator.run_turn(&mut log, "refunds?", &tx).await;

        assert!(matches!(result, Err(TurnError::Retrieval { .. })));
        assert_eq!(kinds(&log), vec!["user"]);

        drop(tx);
        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, TurnEvent::Chunk(_))));
        let tail: Vec<&TurnEvent> = events.iter().rev().take(2).collect();
        assert_eq!(
            tail,
            vec![
                &TurnEvent::StateChanged(TurnState::Idle),
                &TurnEvent::StateChanged(TurnState::Errored)
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_search_skips_later_instructions() {
        let llm = ScriptedProvider::new()
            .reply(TWO_SEARCH_PLAN)
            .reply(r#"{"query": "refund window"}"#)
            .reply(r#"{"query": "damaged items"}"#)
            .stream(&["unused"]);
        let store = StaticStore::new(ScoreOrder::AscendingDistance)
            .then_fail()
            .then(vec![doc("a", 0.1, "never searched")]);
        let orchestrator = TurnOrchestrator::new(
            Arc::new(llm),
            Arc::new(store),
            PlanLimits::default(),
            5,
        );
        let (tx, _rx) = events::channel();
        let mut log = HistoryLog::new();

        let result = orchestrator.run_turn(&mut log, "refunds?", &tx).await;
        assert!(matches!(result, Err(TurnError::Retrieval { ref query, .. }) if query == "refund window"));
        assert_eq!(kinds(&log), vec!["user"]);
    }

    #[tokio::test]
    async fn test_query_transform_failure_aborts_turn() {
        let llm = ScriptedProvider::new()
            .reply(ONE_SEARCH_PLAN)
            .reply("not json at all")
            .stream(&["unused"]);
        let store = StaticStore::new(ScoreOrder::AscendingDistance);
        let orchestrator = orchestrator(llm, store);
        let (tx, _rx) = events::channel();
        let mut log = HistoryLog::new();

        let result = orchestrator.run_turn(&mut log, "refunds?", &tx).await;
        assert!(matches!(
            result,
            Err(TurnError::QueryTransform { ref suggestion, .. }) if suggestion == "refund window"
        ));
        assert_eq!(kinds(&log), vec!["user"]);
    }

    #[tokio::test]
    async fn test_two_searches_accumulate_documents_in_order() {
        let llm = Arc::new(
            ScriptedProvider::new()
                .reply(TWO_SEARCH_PLAN)
                .reply(r#"{"query": "refund window"}"#)
                .reply(r#"{"query": "damaged items"}"#)
                .stream(&["Combined answer."]),
        );
        let store = Arc::new(
            StaticStore::new(ScoreOrder::AscendingDistance)
                .then(vec![doc("a", 0.4, "A"), doc("b", 0.1, "B")])
                .then(vec![doc("c", 0.3, "C")]),
        );
        let orchestrator = TurnOrchestrator::new(
            Arc::clone(&llm) as Arc<dyn LLMProvider>,
            Arc::clone(&store) as Arc<dyn VectorStore>,
            PlanLimits::default(),
            5,
        );
        let (tx, _rx) = events::channel();
        let mut log = HistoryLog::new();

        let outcome = orchestrator.run_turn(&mut log, "refunds?", &tx).await.unwrap();

        assert_eq!(outcome.searches, 2);
        assert_eq!(outcome.sources, vec!["0.10\tb", "0.40\ta", "0.30\tc"]);
        assert_eq!(kinds(&log), vec!["user", "query", "query", "assistant"]);
        assert_eq!(store.queries(), vec!["refund window", "damaged items"]);

        let prompts = llm.prompts();
        let generation_prompt = prompts.last().unwrap();
        assert!(generation_prompt.contains("- b\n- a\n- c\n"));
        assert!(generation_prompt.contains("Result:\nB\n\n---\n\nA"));
    }

    #[tokio::test]
    async fn test_routing_failure_uses_fallback_plan() {
        let llm = ScriptedProvider::new()
            .fail(LLMError::ParseError("garbage".into()))
            .stream(&["I could not find an answer."]);
        let store = Arc::new(StaticStore::new(ScoreOrder::AscendingDistance));
        let orchestrator = TurnOrchestrator::new(
            Arc::new(llm),
            Arc::clone(&store) as Arc<dyn VectorStore>,
            PlanLimits::default(),
            5,
        );
        let (tx, mut rx) = events::channel();
        let mut log = HistoryLog::new();

        let outcome = orchestrator.run_turn(&mut log, "hello", &tx).await.unwrap();

        assert!(outcome.routing_fallback);
        assert_eq!(
            outcome.plan.instructions(),
            &[Instruction::generate(FALLBACK_SUGGESTION)]
        );
        assert!(outcome.sources.is_empty());
        assert!(store.queries().is_empty());
        assert_eq!(kinds(&log), vec!["user", "assistant"]);

        drop(tx);
        assert!(drain(&mut rx).contains(&TurnEvent::PlanReady {
            plan: Plan::fallback(),
            fallback: true
        }));
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_committed_searches() {
        let llm = ScriptedProvider::new()
            .reply(ONE_SEARCH_PLAN)
            .reply(r#"{"query": "refund window"}"#)
            .stream_then_fail(&["Refunds "], LLMError::NetworkError("reset".into()));
        let orchestrator = orchestrator(llm, StaticStore::new(ScoreOrder::AscendingDistance));
        let (tx, _rx) = events::channel();
        let mut log = HistoryLog::new();

        let result = orchestrator.run_turn(&mut log, "refunds?", &tx).await;
        assert!(matches!(result, Err(TurnError::Generation { .. })));
        assert_eq!(kinds(&log), vec!["user", "query"]);
        assert_eq!(
            log.entries()[1],
            HistoryEntry::query("refund window", NO_CONTEXTS_FOUND)
        );
    }

    #[tokio::test]
    async fn test_second_turn_sees_first_turn() {
        let llm = Arc::new(
            ScriptedProvider::new()
                .reply(r#"{"plan": [{"action": "generate", "suggestion": "greet"}]}"#)
                .stream(&["Hello!"])
                .reply(r#"{"plan": [{"action": "generate", "suggestion": "answer"}]}"#)
                .stream(&["Again."]),
        );
        let orchestrator = TurnOrchestrator::new(
            Arc::clone(&llm) as Arc<dyn LLMProvider>,
            Arc::new(StaticStore::new(ScoreOrder::AscendingDistance)),
            PlanLimits::default(),
            5,
        );
        let (tx, _rx) = events::channel();
        let mut log = HistoryLog::new();

        orchestrator.run_turn(&mut log, "hi", &tx).await.unwrap();
        orchestrator.run_turn(&mut log, "and again", &tx).await.unwrap();

        let prompts = llm.prompts();
        assert!(prompts[2].contains("--- Previous response\nMessage:\nHello!"));
        assert_eq!(kinds(&log), vec!["user", "assistant", "user", "assistant"]);
    }
}
