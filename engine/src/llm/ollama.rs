//! Ollama LLM Provider
//!
//! This module implements the LLMProvider trait for Ollama, a local LLM provider.
//! Ollama runs models locally on the user's machine, typically at http://localhost:11434.
//!
//! Key features:
//! - Local execution (no API keys required)
//! - JSON-constrained completions via `format: "json"`
//! - NDJSON streaming from `/api/generate`
//! - Error mapping to LLMError

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use super::{LLMError, LLMProvider, ResponseFormat, Result, TextStream};
use crate::config::OllamaConfig;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Ollama provider configuration
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    /// Base URL for Ollama API (typically http://localhost:11434)
    base_url: String,

    /// Model name to use (e.g., "llama3")
    model: String,

    /// Sampling temperature
    temperature: f64,

    /// HTTP client for API requests
    client: Client,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Arguments
    /// * `base_url` - Base URL for Ollama API (e.g., "http://localhost:11434")
    /// * `model` - Model name to use (e.g., "llama3")
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.0,
            client: build_client(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create a provider from the `[llm.ollama]` configuration section
    pub fn from_config(config: &OllamaConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            client: build_client(config.timeout_secs),
        }
    }

    /// Model this provider sends requests to
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, prompt: &str, format: ResponseFormat, stream: bool) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream,
            format: match format {
                ResponseFormat::Json => Some("json".to_string()),
                ResponseFormat::Text => None,
            },
            options: GenerateOptions {
                temperature: self.temperature,
            },
        }
    }

    async fn send(&self, request: &GenerateRequest) -> Result<reqwest::Response> {
        let url = format!("{}/api/generate", self.base_url);

        tracing::debug!(
            "Ollama request: model={}, stream={}, format={:?}, prompt_chars={}",
            self.model,
            request.stream,
            request.format,
            request.prompt.len()
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| map_request_error(e, &self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(if status.is_client_error() {
                LLMError::InvalidRequest(format!("Ollama API error ({}): {}", status, error_text))
            } else {
                LLMError::ProviderUnavailable(format!(
                    "Ollama API error ({}): {}",
                    status, error_text
                ))
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn complete(&self, prompt: &str, format: ResponseFormat) -> Result<String> {
        let request = self.build_request(prompt, format, false);
        let start = std::time::Instant::now();
        let response = self.send(&request).await?;

        let body: GenerateChunk = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(format!("Failed to parse Ollama response: {}", e)))?;

        if let Some(error) = body.error {
            return Err(LLMError::ProviderUnavailable(error));
        }

        tracing::info!(
            "Ollama {} completion received in {:.1}s",
            format,
            start.elapsed().as_secs_f64()
        );

        Ok(body.response)
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream> {
        let request = self.build_request(prompt, ResponseFormat::Text, true);
        let response = self.send(&request).await?;

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();

        Ok(decode_generate_stream(bytes))
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Ollama health check failed: {}", e);
                false
            }
        }
    }
}

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Map a reqwest transport error onto the LLM error taxonomy
pub(crate) fn map_request_error(e: reqwest::Error, base_url: &str) -> LLMError {
    if e.is_timeout() {
        LLMError::Timeout
    } else if e.is_connect() {
        LLMError::ProviderUnavailable(format!(
            "Cannot connect to Ollama at {}. Is Ollama running?",
            base_url
        ))
    } else {
        LLMError::NetworkError(e.to_string())
    }
}

/// Splits a byte stream into newline-terminated lines
#[derive(Debug, Default)]
struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Feed bytes, returning every line completed by them
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    /// Flush a trailing line that was not newline-terminated
    fn finish(&mut self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        (!text.is_empty()).then_some(text)
    }
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: LineDecoder,
    pending: VecDeque<Result<String>>,
    finished: bool,
}

impl StreamState {
    fn enqueue_line(&mut self, line: &str) {
        if self.finished {
            return;
        }
        match serde_json::from_str::<GenerateChunk>(line) {
            Ok(chunk) => {
                if let Some(error) = chunk.error {
                    self.pending.push_back(Err(LLMError::ProviderUnavailable(error)));
                    self.finished = true;
                    return;
                }
                if !chunk.response.is_empty() {
                    self.pending.push_back(Ok(chunk.response));
                }
                if chunk.done {
                    self.finished = true;
                }
            }
            Err(e) => {
                self.pending.push_back(Err(LLMError::ParseError(format!(
                    "Malformed stream line: {}",
                    e
                ))));
                self.finished = true;
            }
        }
    }
}

/// Turn Ollama's NDJSON byte stream into a stream of text chunks.
///
/// The stream ends after the `done: true` line; an `error` line, a
/// transport failure, or EOF before `done` is yielded as the final item.
fn decode_generate_stream(bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> TextStream {
    let state = StreamState {
        bytes,
        decoder: LineDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for line in state.decoder.push(&chunk) {
                        state.enqueue_line(&line);
                    }
                }
                Some(Err(e)) => {
                    let err = if e.is_timeout() {
                        LLMError::Timeout
                    } else {
                        LLMError::NetworkError(format!("Stream interrupted: {}", e))
                    };
                    state.pending.push_back(Err(err));
                    state.finished = true;
                }
                None => {
                    if let Some(line) = state.decoder.finish() {
                        state.enqueue_line(&line);
                    }
                    if !state.finished {
                        state.pending.push_back(Err(LLMError::NetworkError(
                            "Stream ended before done".to_string(),
                        )));
                        state.finished = true;
                    }
                }
            }
        }
    })
    .boxed()
}

/// Ollama generate request format
#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
}

/// One generate response object (the whole reply, or one NDJSON line)
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}
