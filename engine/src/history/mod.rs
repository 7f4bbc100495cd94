//! Conversation History Log
//!
//! Append-only record of everything that happened in the session: user
//! messages, assistant answers, and document searches with their results.
//! The log is rendered to a plain-text transcript for every prompt. Rendering
//! is linear, so appending an entry only ever appends text to the transcript.

use serde::Serialize;

/// Result text recorded for a search that returned no documents
pub const NO_CONTEXTS_FOUND: &str = "No contexts found";

/// Separator placed between document contents in a search result
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// How assistant entries are labelled in the rendered transcript
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Shown to the answering model; assistant text is labelled "Assistant"
    #[default]
    Conversation,

    /// Shown to helper calls (router, query transformer)
    Helper,
}

impl RenderMode {
    fn assistant_label(self) -> &'static str {
        match self {
            RenderMode::Conversation => "Assistant",
            RenderMode::Helper => "Previous response",
        }
    }
}

/// A single conversation event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// Message typed by the user
    UserTurn { message: String },

    /// Complete answer produced by the response generator
    AssistantTurn { message: String },

    /// A document search and the text it produced
    QueryTurn { query: String, result_text: String },
}

impl HistoryEntry {
    pub fn user(message: impl Into<String>) -> Self {
        HistoryEntry::UserTurn {
            message: message.into(),
        }
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        HistoryEntry::AssistantTurn {
            message: message.into(),
        }
    }

    pub fn query(query: impl Into<String>, result_text: impl Into<String>) -> Self {
        HistoryEntry::QueryTurn {
            query: query.into(),
            result_text: result_text.into(),
        }
    }

    /// Render this entry as one transcript block
    pub fn render(&self, mode: RenderMode) -> String {
        match self {
            HistoryEntry::UserTurn { message } => {
                format!("\n--- User\nMessage: {}\n\n", message)
            }
            HistoryEntry::AssistantTurn { message } => {
                format!("\n--- {}\nMessage:\n{}\n\n", mode.assistant_label(), message)
            }
            HistoryEntry::QueryTurn { query, result_text } => {
                format!("\n--- Query\nInput: {}\nResult:\n{}\n\n", query, result_text)
            }
        }
    }
}

/// Join document contents into the result text of a `QueryTurn`
pub fn result_text<'a, I>(contents: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let contents: Vec<&str> = contents.into_iter().collect();
    if contents.is_empty() {
        NO_CONTEXTS_FOUND.to_string()
    } else {
        contents.join(CONTEXT_DELIMITER)
    }
}

/// Ordered, append-only conversation log
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Entries are never modified or removed afterwards.
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the whole log as a transcript
    pub fn render(&self, mode: RenderMode) -> String {
        self.entries.iter().map(|entry| entry.render(mode)).collect()
    }
}
