//! Completion Service Abstraction Layer
//!
//! This module provides the interface the conductor uses to talk to a text
//! completion service. The `LLMProvider` trait exposes two calls: a
//! one-shot completion (optionally constrained to JSON output) used by the
//! router and the query transformer, and a streaming completion used by the
//! response generator.
//!
//! Model output is untrusted. `parse_json_reply` turns a JSON-mode reply into
//! a typed value and reports any mismatch as `LLMError::ParseError`.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use std::fmt;

pub mod ollama;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Stream of text chunks in arrival order
pub type TextStream = BoxStream<'static, Result<String>>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Output constraint for a completion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Free-form text
    Text,

    /// The provider must emit a single JSON value
    Json,
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseFormat::Text => write!(f, "text"),
            ResponseFormat::Json => write!(f, "json"),
        }
    }
}

/// LLM Provider trait that all completion services must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "ollama")
    fn name(&self) -> &str;

    /// Returns true if this is a local provider
    fn is_local(&self) -> bool;

    /// Run a single completion and return the full reply text
    ///
    /// With `ResponseFormat::Json` the reply is expected to be a JSON document;
    /// callers still validate it with `parse_json_reply`.
    async fn complete(&self, prompt: &str, format: ResponseFormat) -> Result<String>;

    /// Run a completion and yield the reply incrementally
    ///
    /// Errors raised while the stream is being consumed are yielded as the
    /// stream's final item.
    async fn stream(&self, prompt: &str) -> Result<TextStream>;

    /// Check if the provider is currently healthy and available
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Parse a JSON-mode reply into `T`.
///
/// Accepts, in order:
/// 1. Raw JSON (the whole reply is the document)
/// 2. A markdown code fence around the document, with or without trailing prose
/// 3. The first balanced `{...}` object embedded in prose
///
/// The located document must deserialize into `T`; a shape mismatch is a
/// `ParseError`, never a best-effort guess.
pub fn parse_json_reply<T: DeserializeOwned>(content: &str) -> Result<T> {
    let trimmed = content.trim();

    let candidate = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        trimmed
    } else if let Some(inner) = extract_fenced_json(trimmed) {
        inner.trim()
    } else if let Some(object) = trimmed.find('{').and_then(|pos| extract_balanced_json(&trimmed[pos..])) {
        object
    } else {
        return Err(LLMError::ParseError(format!(
            "No JSON document in reply ({} chars)",
            trimmed.len()
        )));
    };

    serde_json::from_str(candidate)
        .map_err(|e| LLMError::ParseError(format!("Reply does not match expected schema: {}", e)))
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
/// Returns `None` if no fenced block is found.
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
