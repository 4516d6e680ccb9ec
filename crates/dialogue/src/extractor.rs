//! Reply extraction.
//!
//! Engines return the prompt followed by whatever the model sampled, and
//! small models happily keep writing both sides of the dialogue. The
//! extractor isolates the assistant's turn:
//!
//! 1. If the text has an `Assistant:` marker, take what follows the last
//!    one, up to the first `User:` marker after it.
//! 2. Otherwise, if the text starts with the prompt, drop that prefix.
//! 3. Otherwise, take the text as-is.
//!
//! The result is trimmed and may still be empty; the sanitizer deals with that.

const ASSISTANT_MARKER: &str = "Assistant:";
const USER_MARKER: &str = "User:";

/// Pull the assistant's candidate reply out of raw engine output.
pub fn extract_reply<'a>(raw: &'a str, prompt: &str) -> &'a str {
    let candidate = if raw.contains(ASSISTANT_MARKER) {
        let after_last = raw.rsplit(ASSISTANT_MARKER).next().unwrap_or_default();
        after_last.split(USER_MARKER).next().unwrap_or_default()
    } else if let Some(rest) = raw.strip_prefix(prompt) {
        rest
    } else {
        raw
    };
    candidate.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_segment_after_last_assistant_marker() {
        let raw = "User: hi\nAssistant: hello\nUser: more\nAssistant: sure, go ahead";
        assert_eq!(extract_reply(raw, "User: hi"), "sure, go ahead");
    }

    #[test]
    fn stops_before_next_user_marker() {
        assert_eq!(extract_reply("Assistant: ok\nUser: next", ""), "ok");
    }

    #[test]
    fn user_marker_cut_uses_first_occurrence() {
        let raw = "User: q\nAssistant: fine User: a User: b";
        assert_eq!(extract_reply(raw, "User: q"), "fine");
    }

    #[test]
    fn strips_prompt_prefix_without_marker() {
        let prompt = "User: tell me a joke";
        let raw = "User: tell me a joke\n Why did the crab cross the road?";
        assert_eq!(extract_reply(raw, prompt), "Why did the crab cross the road?");
    }

    #[test]
    fn unrelated_text_is_returned_trimmed() {
        assert_eq!(extract_reply("  something else  ", "User: hi"), "something else");
    }

    #[test]
    fn prompt_only_output_is_empty() {
        let prompt = "User: hi";
        assert_eq!(extract_reply(prompt, prompt), "");
    }

    #[test]
    fn trailing_assistant_marker_is_empty() {
        assert_eq!(extract_reply("User: hi\nAssistant:", "User: hi"), "");
    }

    #[test]
    fn marker_inside_history_wins_over_prefix() {
        // The prompt itself contains an Assistant turn, so the marker path applies
        // even though the raw text starts with the prompt.
        let prompt = "User: hi\nAssistant: hey\nUser: how are you";
        let raw = format!("{prompt} doing today?");
        assert_eq!(extract_reply(&raw, prompt), "hey");
    }
}
