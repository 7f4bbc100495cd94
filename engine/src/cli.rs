//! CLI interface for Docent
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Docent document assistant
///
/// Answers questions about your documents: each message is planned into
/// document searches against a Chroma collection followed by an answer
/// streamed from a local Ollama model.
#[derive(Parser, Debug)]
#[command(name = "docent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an interactive conversation
    Chat,

    /// Answer a single question and exit
    Ask {
        /// The question to answer
        question: String,
    },

    /// Check that Ollama and Chroma are reachable
    Doctor,
}
