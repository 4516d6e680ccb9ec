//! Reply sanitization and canned fallbacks.
//!
//! Keeps the first line of a candidate and swaps degenerate output for a
//! fixed reply, so callers always get at least [`MIN_REPLY_CHARS`] characters.

/// Shortest reply that is passed through as-is.
pub const MIN_REPLY_CHARS: usize = 3;

/// Substituted when the model produced nothing usable.
pub const FALLBACK_EMPTY: &str =
    "I'm not sure how to respond to that. Could you rephrase your question?";

/// Substituted when the model produced a known filler phrase.
pub const FALLBACK_GENERIC: &str = "I'm here to help! What would you like to know?";

/// Returned when the pipeline faults anywhere.
pub const FALLBACK_DEGRADED: &str =
    "I'm having trouble processing your request right now. Please try again in a moment.";

/// Filler the model falls back on, compared after lowercasing.
const GENERIC_PHRASES: &[&str] = &["i understand. please tell me more about that.", "i understand"];

/// Turn a candidate into the reply sent to the caller.
pub fn sanitize_reply(candidate: &str) -> String {
    let first_line = candidate.split('\n').next().unwrap_or_default().trim();

    if first_line.chars().count() < MIN_REPLY_CHARS {
        return FALLBACK_EMPTY.to_string();
    }

    let lowered = first_line.to_lowercase();
    if GENERIC_PHRASES.contains(&lowered.as_str()) {
        return FALLBACK_GENERIC.to_string();
    }

    first_line.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_line_only() {
        assert_eq!(sanitize_reply("Hi\nextra garbage"), FALLBACK_EMPTY);
        assert_eq!(sanitize_reply("Hello there!\nUser says more"), "Hello there!");
    }

    #[test]
    fn short_candidates_get_fallback() {
        assert_eq!(sanitize_reply(""), FALLBACK_EMPTY);
        assert_eq!(sanitize_reply("ok"), FALLBACK_EMPTY);
        assert_eq!(sanitize_reply("   \n long second line"), FALLBACK_EMPTY);
    }

    #[test]
    fn three_characters_pass_through() {
        assert_eq!(sanitize_reply("Yes"), "Yes");
        assert_eq!(sanitize_reply("ñé!"), "ñé!");
    }

    #[test]
    fn generic_phrases_are_replaced_in_any_case() {
        assert_eq!(sanitize_reply("I understand"), FALLBACK_GENERIC);
        assert_eq!(sanitize_reply("i UNDERSTAND"), FALLBACK_GENERIC);
        assert_eq!(
            sanitize_reply("I understand. Please tell me more about that."),
            FALLBACK_GENERIC
        );
    }

    #[test]
    fn generic_match_is_exact() {
        assert_eq!(sanitize_reply("I understand now"), "I understand now");
        assert_eq!(sanitize_reply("I understand."), "I understand.");
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(sanitize_reply("  Sure thing \r\nnext"), "Sure thing");
    }

    #[test]
    fn extract_then_sanitize_is_idempotent() {
        use crate::extractor::extract_reply;

        let prompt = "User: hi";
        let raws = [
            "User: hi\nAssistant: Hello there!\nUser: more",
            "User: hi Nice to meet you.\nsecond line",
            "  something unrelated entirely  ",
            "User: hi\nAssistant: ok",
            "User: hi\nAssistant: I understand",
        ];

        for raw in raws {
            let reply = sanitize_reply(extract_reply(raw, prompt));
            let again = sanitize_reply(extract_reply(&reply, prompt));
            assert_eq!(again, reply, "not stable for {raw:?}");
        }

        assert_eq!(sanitize_reply(extract_reply(raws[3], prompt)), FALLBACK_EMPTY);
        assert_eq!(sanitize_reply(extract_reply(raws[4], prompt)), FALLBACK_GENERIC);
    }

    #[test]
    fn fallbacks_are_stable() {
        for fallback in [FALLBACK_EMPTY, FALLBACK_GENERIC, FALLBACK_DEGRADED] {
            assert_eq!(sanitize_reply(fallback), fallback);
        }
    }
}
