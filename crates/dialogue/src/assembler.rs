//! Prompt assembly.
//!
//! Encodes a [`ConversationContext`] as role-prefixed lines:
//!
//! ```text
//! User: hi
//! Assistant: hello there
//! User: <current message>
//! ```
//!
//! The result is cut to `max_input_length` characters. The cut is a raw
//! character cut of the finished string; it knows nothing about lines,
//! roles or words, so a long history can lose the current message's tail.

use chatline_core::message::{ConversationContext, Role};

/// An assembled prompt, ready for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    text: String,
    truncated: bool,
}

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the character limit cut anything off.
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl AsRef<str> for Prompt {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Builds bounded prompts from conversation context.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_input_length: usize,
}

impl ContextAssembler {
    pub fn new(max_input_length: usize) -> Self {
        Self { max_input_length }
    }

    pub fn max_input_length(&self) -> usize {
        self.max_input_length
    }

    /// Assemble the prompt. Never fails.
    pub fn assemble(&self, context: &ConversationContext) -> Prompt {
        let mut text = String::new();
        for turn in context.history() {
            push_line(&mut text, turn.role, &turn.content);
            text.push('\n');
        }
        push_line(&mut text, Role::User, context.message());

        let truncated = truncate_chars(&mut text, self.max_input_length);
        Prompt { text, truncated }
    }
}

fn push_line(out: &mut String, role: Role, content: &str) {
    out.push_str(role.label());
    out.push(' ');
    out.push_str(content);
}

/// Keep the first `max_chars` characters. Returns whether anything was cut.
fn truncate_chars(text: &mut String, max_chars: usize) -> bool {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            text.truncate(byte_idx);
            true
        }
        None => false,
    }
}
