//! Conductor Types
//!
//! Instructions and plans produced by the router, and the limits every plan
//! must respect before the orchestrator will run it.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::RoutingFailure;

/// Suggestion carried by the plan used when routing fails
pub const FALLBACK_SUGGESTION: &str = "inform the user no answer could be found";

/// What an instruction asks the orchestrator to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    /// Search the vector store
    DocumentSearch,

    /// Produce the final answer
    Generate,
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstructionKind::DocumentSearch => write!(f, "document_search"),
            InstructionKind::Generate => write!(f, "generate"),
        }
    }
}

/// A single step of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(rename = "action")]
    pub kind: InstructionKind,

    /// Natural-language hint for the step (what to search for, or how to answer)
    #[serde(default)]
    pub suggestion: String,
}

impl Instruction {
    pub fn search(suggestion: impl Into<String>) -> Self {
        Self {
            kind: InstructionKind::DocumentSearch,
            suggestion: suggestion.into(),
        }
    }

    pub fn generate(suggestion: impl Into<String>) -> Self {
        Self {
            kind: InstructionKind::Generate,
            suggestion: suggestion.into(),
        }
    }
}

/// Bounds applied to every routed plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub max_instructions: usize,
    pub max_consecutive_searches: usize,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            max_instructions: 6,
            max_consecutive_searches: 3,
        }
    }
}

/// A validated, ordered sequence of instructions
///
/// Invariants: non-empty, exactly one `Generate` and it is last, no more
/// than `max_instructions` steps, no run of searches longer than
/// `max_consecutive_searches`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    instructions: Vec<Instruction>,
}

impl Plan {
    /// Validate `instructions` against `limits`
    pub fn new(instructions: Vec<Instruction>, limits: &PlanLimits) -> Result<Self, RoutingFailure> {
        if instructions.is_empty() {
            return Err(RoutingFailure::EmptyPlan);
        }

        if instructions.len() > limits.max_instructions {
            return Err(RoutingFailure::TooManyInstructions {
                len: instructions.len(),
                max: limits.max_instructions,
            });
        }

        let last = instructions.len() - 1;
        let mut run = 0;
        for (index, instruction) in instructions.iter().enumerate() {
            match instruction.kind {
                InstructionKind::Generate if index != last => {
                    return Err(RoutingFailure::GenerateNotLast { index });
                }
                InstructionKind::Generate => run = 0,
                InstructionKind::DocumentSearch => {
                    run += 1;
                    if run > limits.max_consecutive_searches {
                        return Err(RoutingFailure::TooManyConsecutiveSearches {
                            run,
                            max: limits.max_consecutive_searches,
                        });
                    }
                }
            }
        }

        if instructions[last].kind != InstructionKind::Generate {
            return Err(RoutingFailure::MissingGenerate);
        }

        Ok(Self { instructions })
    }

    /// Single-step plan telling the user no answer could be found
    pub fn fallback() -> Self {
        Self {
            instructions: vec![Instruction::generate(FALLBACK_SUGGESTION)],
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Number of document searches in the plan
    pub fn search_count(&self) -> usize {
        self.instructions
            .iter()
            .filter(|i| i.kind == InstructionKind::DocumentSearch)
            .count()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.instructions.iter().map(|i| i.kind.to_string()).collect();
        write!(f, "[{}]", steps.join(" -> "))
    }
}
