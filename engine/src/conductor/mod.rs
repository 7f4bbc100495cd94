//! Conductor System
//!
//! Orchestrates one conversational turn: routing, query transformation,
//! document retrieval, and streamed response generation.

pub mod error;
pub mod events;
pub mod generator;
pub mod orchestrator;
pub mod prompts;
pub mod query;
pub mod retrieval;
pub mod router;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{QueryTransformFailure, RoutingFailure, TurnError};
pub use events::{EventSink, EventStream, TurnEvent, TurnState};
pub use generator::{GeneratedAnswer, ResponseGenerator};
pub use orchestrator::{TurnOrchestrator, TurnOutcome, TurnSession};
pub use query::QueryTransformer;
pub use retrieval::{RetrievalExecutor, MAX_RETRIEVAL_RESULTS};
pub use router::{RoutedPlan, Router};
pub use types::{Instruction, InstructionKind, Plan, PlanLimits};
