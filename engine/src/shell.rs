//! Interactive shell input handling
//!
//! Classifies each line typed at the prompt. Lines starting with `/` are
//! commands; anything else is a message, unless it contains one of the
//! characters `<>/{}[]~` or a backtick, which are rejected.

use regex::Regex;
use std::sync::OnceLock;

/// Shell commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Exit,
    History,
    Unknown(String),
}

/// What a line of input means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellInput {
    Empty,
    Command(ShellCommand),
    Invalid,
    Message(String),
}

fn allowed_message() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^<>/{}\[\]~`]*$").expect("Invalid message pattern"))
}

/// Classify one line of shell input
pub fn classify_input(line: &str) -> ShellInput {
    let line = line.trim();

    if let Some(command) = line.strip_prefix('/') {
        return ShellInput::Command(match command {
            "exit" => ShellCommand::Exit,
            "history" => ShellCommand::History,
            other => ShellCommand::Unknown(other.to_string()),
        });
    }

    if line.is_empty() {
        ShellInput::Empty
    } else if !allowed_message().is_match(line) {
        ShellInput::Invalid
    } else {
        ShellInput::Message(line.to_string())
    }
}
