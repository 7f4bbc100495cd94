//! Error types and handling
//!
//! This module provides the startup and infrastructure error type used
//! throughout Docent. Errors implement the `ErrorExt` trait which provides
//! user-friendly hints and indicates whether errors are recoverable.
//!
//! Turn-level failures (routing, query transformation, retrieval,
//! generation) live in the engine next to the components that raise them;
//! they implement `ErrorExt` as well so the shell can render them uniformly.

use thiserror::Error;

/// Trait for Docent error extensions
///
/// Provides additional context for errors, including user-friendly
/// hints and recoverability information.
pub trait ErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// request payloads, prompt text, or internal details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors leave the session usable: the next turn may
    /// succeed. Non-recoverable errors require fixing configuration or
    /// restarting the process.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **LLM Provider**: Completion service unavailable or misbehaving
/// - **Store**: Vector store unavailable or misbehaving
/// - **IO**: Reading or writing local files
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ErrorExt};
///
/// let error = EngineError::Store("connection refused".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::Config("bad log level".to_string());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    // Vector store errors
    #[error("Vector store error: {0}")]
    Store(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::LLMProvider(_) => "Completion service unavailable. Is Ollama running?",
            Self::Store(_) => "Vector store unavailable. Is Chroma running?",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}
