//! Docent Engine Library
//!
//! Conversational retrieval-augmented generation: every user turn is routed
//! to a plan of document searches and a final streamed answer. The library
//! is used by both the `docent` binary and integration tests.

/// Configuration management module
pub mod config;

/// Conversation history log
pub mod history;

/// Completion service abstraction layer
pub mod llm;

/// Vector store abstraction layer
pub mod store;

/// Turn orchestration: routing, query transformation, retrieval, generation
pub mod conductor;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Interactive shell input handling
pub mod shell;

/// Command handlers module
pub mod handlers;
