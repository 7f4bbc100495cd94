//! Docent SDK
//!
//! Shared types and error definitions for Docent components.
//! Completion providers and vector store adapters depend on this crate
//! without pulling in the engine.

/// Error types and handling
pub mod errors;

/// Retrieval types shared between stores and the engine
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, ErrorExt};
pub use types::{RetrievedDocument, ScoreOrder};
