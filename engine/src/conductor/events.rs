//! Turn events
//!
//! Everything the caller sees of a running turn arrives through an
//! `EventSink` in the order it happened: state transitions, the plan,
//! each search, every answer chunk, and finally the citations.

use serde::Serialize;
use tokio::sync::mpsc;

use super::types::Plan;

/// Channel the orchestrator reports progress on
pub type EventSink = mpsc::UnboundedSender<TurnEvent>;

/// Receiving end of an `EventSink`
pub type EventStream = mpsc::UnboundedReceiver<TurnEvent>;

/// Create a connected sink/stream pair
pub fn channel() -> (EventSink, EventStream) {
    mpsc::unbounded_channel()
}

/// Where the orchestrator is within a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    Routing,
    Searching { step: usize },
    Generating { step: usize },
    Errored,
}

/// Progress notifications emitted during a turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum TurnEvent {
    StateChanged(TurnState),

    /// The plan about to run; `fallback` is true when routing failed
    PlanReady { plan: Plan, fallback: bool },

    /// A suggestion was turned into a search string
    QueryPrepared { suggestion: String, query: String },

    DocumentsRetrieved { query: String, count: usize },

    /// Next piece of the answer, in arrival order
    Chunk(String),

    /// Citation lines for the documents behind the answer
    Sources(Vec<String>),
}

/// Send an event, ignoring a caller that stopped listening
pub(crate) fn emit(events: &EventSink, event: TurnEvent) {
    if events.send(event).is_err() {
        tracing::trace!("Turn event dropped: receiver closed");
    }
}
