//! Conversation domain types.
//!
//! These are the value objects that flow through a single chat request:
//! caller sends a message + recent turns → assembler builds a prompt →
//! engine continues it → extractor and sanitizer produce a [`ChatReply`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How many prior turns are ever consulted when building a prompt.
pub const HISTORY_WINDOW: usize = 4;

/// The role of a speaker in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The assistant (model output)
    Assistant,
}

impl Role {
    /// Role assigned to an untagged turn from its position in the history window.
    ///
    /// Even positions are user turns, odd positions are assistant turns.
    pub fn from_parity(position: usize) -> Self {
        if position % 2 == 0 {
            Self::User
        } else {
            Self::Assistant
        }
    }

    /// The label written in front of a prompt line, without the trailing space.
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User:",
            Self::Assistant => "Assistant:",
        }
    }
}

/// A single prior turn with its speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A history entry as it arrives from a caller.
///
/// Plain strings carry no role; tagged entries do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryEntry {
    Plain(String),
    Tagged(ConversationTurn),
}

impl From<&str> for HistoryEntry {
    fn from(s: &str) -> Self {
        Self::Plain(s.to_string())
    }
}

/// The current message plus the most recent prior turns.
///
/// Holds at most [`HISTORY_WINDOW`] turns; older history is dropped on
/// construction and never consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationContext {
    message: String,
    history: Vec<ConversationTurn>,
}

impl ConversationContext {
    /// Build a context from turns that already carry roles.
    pub fn new(message: impl Into<String>, history: Vec<ConversationTurn>) -> Self {
        let skip = history.len().saturating_sub(HISTORY_WINDOW);
        Self {
            message: message.into(),
            history: history.into_iter().skip(skip).collect(),
        }
    }

    /// Build a context from caller-supplied entries.
    ///
    /// Untagged entries get their role from their parity inside the retained
    /// window, so `["hi", "hello"]` reads as user then assistant. The caller is
    /// trusted to alternate starting with the user; nothing here validates it.
    pub fn from_entries(message: impl Into<String>, entries: Vec<HistoryEntry>) -> Self {
        let skip = entries.len().saturating_sub(HISTORY_WINDOW);
        let history = entries
            .into_iter()
            .skip(skip)
            .enumerate()
            .map(|(position, entry)| match entry {
                HistoryEntry::Plain(content) => ConversationTurn {
                    role: Role::from_parity(position),
                    content,
                },
                HistoryEntry::Tagged(turn) => turn,
            })
            .collect();
        Self {
            message: message.into(),
            history,
        }
    }

    /// Convenience for plain string history.
    pub fn from_plain<S: AsRef<str>>(message: impl Into<String>, history: &[S]) -> Self {
        let entries = history
            .iter()
            .map(|s| HistoryEntry::Plain(s.as_ref().to_string()))
            .collect();
        Self::from_entries(message, entries)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }
}

/// The final reply handed back to a caller.
///
/// `response` is always sanitized text of at least three characters; the
/// timestamp is taken when the reply is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatReply {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            timestamp: Utc::now(),
        }
    }
}
