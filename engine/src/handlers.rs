//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - chat: Interactive conversation
//! - ask: Answer one question
//! - doctor: Validate configuration and check the external services

use anyhow::Result;
use sdk::errors::{EngineError, ErrorExt};
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::conductor::events::{self, EventStream};
use crate::conductor::{TurnError, TurnEvent, TurnOrchestrator, TurnOutcome};
use crate::config::Config;
use crate::history::{HistoryEntry, HistoryLog, RenderMode};
use crate::llm::ollama::OllamaProvider;
use crate::llm::LLMProvider;
use crate::shell::{classify_input, ShellCommand, ShellInput};
use crate::store::{ChromaStore, OllamaEmbedder, VectorStore};

const RULE: &str = "-------------------------------";

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Wire the Ollama provider and Chroma store described by `config` into an
/// orchestrator
pub fn build_orchestrator(config: &Config) -> TurnOrchestrator {
    let llm: Arc<dyn LLMProvider> = Arc::new(OllamaProvider::from_config(&config.llm.ollama));
    let embedder = Arc::new(OllamaEmbedder::from_config(&config.embeddings));
    let store: Arc<dyn VectorStore> = Arc::new(ChromaStore::from_config(&config.store, embedder));

    TurnOrchestrator::new(
        llm,
        store,
        config.conductor.plan_limits(),
        config.store.top_k,
    )
}

/// Prints turn events to the terminal as they arrive
///
/// Answer text goes to stdout; progress notes go to stderr.
#[derive(Default)]
struct TurnRenderer {
    answering: bool,
}

impl TurnRenderer {
    fn render(&mut self, event: TurnEvent) {
        match event {
            TurnEvent::PlanReady { plan, fallback } => {
                if fallback {
                    eprintln!("Could not plan a document search.");
                } else {
                    tracing::debug!("Plan: {}", plan);
                }
            }
            TurnEvent::QueryPrepared { query, .. } => {
                eprintln!("Searching documents for '{}' ...", query);
            }
            TurnEvent::DocumentsRetrieved { count, .. } => {
                eprintln!("Found {} documents", count);
            }
            TurnEvent::Chunk(text) => {
                if !self.answering {
                    println!();
                    self.answering = true;
                }
                print!("{}", text);
                std::io::stdout().flush().ok();
            }
            TurnEvent::Sources(sources) => {
                self.finish();
                println!("{}", RULE);
                println!("Score\tSources:");
                for source in sources {
                    println!("{}", source);
                }
                println!("{}", RULE);
            }
            TurnEvent::StateChanged(_) => {}
        }
    }

    /// End the streamed answer, if one is in progress
    fn finish(&mut self) {
        if self.answering {
            println!("\n");
            self.answering = false;
        }
    }

    fn drain(&mut self, rx: &mut EventStream) {
        while let Ok(event) = rx.try_recv() {
            self.render(event);
        }
        self.finish();
    }
}

fn report_turn_error(error: &TurnError) {
    eprintln!("Error: {}", error.user_hint());
    eprintln!("  caused by: {}", error_chain(error));
}

/// Turn a failed turn into a command error: the hint as context over the chain
fn turn_failure(error: &TurnError) -> anyhow::Error {
    anyhow::anyhow!(error_chain(error)).context(error.user_hint().to_string())
}

/// Join an error and its sources into one line
fn error_chain(error: &TurnError) -> String {
    let mut messages = vec![error.to_string()];
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        messages.push(cause.to_string());
        source = cause.source();
    }
    messages.join(": ")
}

/// Run the interactive shell
pub async fn handle_chat(config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config);
    let mut history = HistoryLog::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type /exit to quit.");

    loop {
        print!("{}", config.shell.prompt);
        std::io::stdout().flush().ok();

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                continue;
            }
        };

        // EOF
        let Some(line) = line else {
            println!();
            break;
        };

        let message = match classify_input(&line) {
            ShellInput::Empty => continue,
            ShellInput::Invalid => {
                println!("Invalid query");
                continue;
            }
            ShellInput::Command(ShellCommand::Exit) => break,
            ShellInput::Command(ShellCommand::History) => {
                if history.is_empty() {
                    println!("No conversation yet.");
                } else {
                    print!("{}", history.render(RenderMode::Conversation));
                }
                continue;
            }
            ShellInput::Command(ShellCommand::Unknown(name)) => {
                println!("Command '{}' not found", name);
                continue;
            }
            ShellInput::Message(message) => message,
        };

        if let Err(e) = run_interactive_turn(&orchestrator, &mut history, &message).await {
            tracing::error!("Ending session: {}", e);
            return Err(turn_failure(&e));
        }
    }

    Ok(())
}

/// Run one turn, rendering events as they arrive; Ctrl-C abandons the turn
///
/// Recoverable failures are reported and swallowed so the session goes on.
/// A failure the next turn cannot recover from is returned.
async fn run_interactive_turn(
    orchestrator: &TurnOrchestrator,
    history: &mut HistoryLog,
    message: &str,
) -> Result<(), TurnError> {
    let (tx, mut rx) = events::channel();
    let mut renderer = TurnRenderer::default();

    let turn = orchestrator.run_turn(history, message, &tx);
    tokio::pin!(turn);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let result = loop {
        tokio::select! {
            biased;
            Some(event) = rx.recv() => renderer.render(event),
            result = &mut turn => break Some(result),
            _ = &mut interrupt => break None,
        }
    };

    renderer.drain(&mut rx);

    match result {
        Some(Ok(outcome)) => {
            tracing::debug!("Turn finished after {} searches", outcome.searches);
        }
        Some(Err(e)) => {
            report_turn_error(&e);
            if !e.is_recoverable() {
                return Err(e);
            }
        }
        None => {
            tracing::warn!("Turn interrupted by user");
            eprintln!("\nInterrupted.");
        }
    }

    Ok(())
}

/// Answer a single question
pub async fn handle_ask(question: String, config: &Config, format: OutputFormat) -> Result<()> {
    let message = match classify_input(&question) {
        ShellInput::Message(message) => message,
        ShellInput::Empty => anyhow::bail!("Question is empty"),
        _ => anyhow::bail!("Invalid query"),
    };

    let orchestrator = build_orchestrator(config);
    let mut history = HistoryLog::new();
    let (tx, mut rx) = events::channel();

    let result = match format {
        OutputFormat::Text => {
            let mut renderer = TurnRenderer::default();
            let turn = orchestrator.run_turn(&mut history, &message, &tx);
            tokio::pin!(turn);

            let result = loop {
                tokio::select! {
                    biased;
                    Some(event) = rx.recv() => renderer.render(event),
                    result = &mut turn => break result,
                }
            };
            renderer.drain(&mut rx);
            result
        }
        OutputFormat::Json => orchestrator.run_turn(&mut history, &message, &tx).await,
    };

    match result {
        Ok(outcome) => {
            if let OutputFormat::Json = format {
                let report = AskReport {
                    outcome: &outcome,
                    history: history.entries(),
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Ok(())
        }
        Err(e) => Err(turn_failure(&e)),
    }
}

/// JSON output of `ask`: the turn outcome plus the transcript it produced
#[derive(Serialize)]
struct AskReport<'a> {
    #[serde(flatten)]
    outcome: &'a TurnOutcome,
    history: &'a [HistoryEntry],
}

/// Result of checking the configured services
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub checks: Vec<(&'static str, &'static str)>,
    pub issues: Vec<EngineError>,
}

/// Check Ollama, Chroma and the configured collection
pub async fn run_diagnostics(config: &Config) -> Diagnostics {
    let mut report = Diagnostics::default();

    // Config is already validated when loaded
    report.checks.push(("Configuration", "Valid"));

    let llm = OllamaProvider::from_config(&config.llm.ollama);
    if llm.check_health().await {
        report.checks.push(("Ollama", "Available"));
    } else {
        report.checks.push(("Ollama", "Not available"));
        report.issues.push(EngineError::LLMProvider(format!(
            "Ollama is not reachable at {}. Start Ollama and pull '{}'.",
            config.llm.ollama.base_url,
            llm.model()
        )));
    }

    let embedder = Arc::new(OllamaEmbedder::from_config(&config.embeddings));
    let store = ChromaStore::from_config(&config.store, embedder);
    if store.check_health().await {
        report.checks.push(("Chroma", "Available"));

        match store.check_collection().await {
            Ok(()) => report.checks.push(("Collection", "Found")),
            Err(e) => {
                report.checks.push(("Collection", "Missing"));
                report.issues.push(EngineError::Store(format!(
                    "Collection '{}' is not usable: {}",
                    config.store.collection, e
                )));
            }
        }
    } else {
        report.checks.push(("Chroma", "Not available"));
        report.issues.push(EngineError::Store(format!(
            "Chroma is not reachable at {}.",
            config.store.base_url
        )));
    }

    report
}

/// Run system diagnostics
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let Diagnostics { checks, issues } = run_diagnostics(config).await;

    match format {
        OutputFormat::Text => {
            println!("Docent System Diagnostics");
            println!("============================");
            println!();

            println!("System Checks:");
            for (check, status) in &checks {
                println!("  {:<25} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                    println!("     Hint: {}", issue.user_hint());
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({ "name": name, "status": status })
                }).collect::<Vec<_>>(),
                "issues": issues.iter().map(|issue| {
                    json!({ "message": issue.to_string(), "hint": issue.user_hint() })
                }).collect::<Vec<_>>(),
                "healthy": issues.is_empty(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
