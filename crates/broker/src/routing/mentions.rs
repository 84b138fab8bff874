//! Spoof-resistant mention parsing: the server re-derives the mention set
//! from message content itself and never trusts a client-supplied
//! `mentions` list for routing decisions.

use regex::Regex;
use std::sync::OnceLock;

fn mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@([A-Za-z0-9][A-Za-z0-9_.\-]{0,63})").unwrap())
}

/// Extract `@name` mentions from `content`, in first-seen order, deduped.
/// Names that don't match [`agentim_domain::agent::is_valid_agent_name`]
/// grammar can't be produced by this pattern, so no separate validation
/// pass is needed downstream.
pub fn parse_mentions(content: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for cap in mention_pattern().captures_iter(content) {
        let name = cap[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_mention() {
        assert_eq!(parse_mentions("@AlphaBot do something"), vec!["AlphaBot"]);
    }

    #[test]
    fn ignores_client_supplied_list_semantics() {
        // This module only looks at `content`; a caller passing a
        // different client-provided mentions list has no effect here —
        // that's the spoof-resistance property, enforced by construction.
        let derived = parse_mentions("@RealAgent help me");
        assert_eq!(derived, vec!["RealAgent"]);
    }

    #[test]
    fn dedupes_repeated_mentions() {
        assert_eq!(
            parse_mentions("@Bot hi @Bot again"),
            vec!["Bot"]
        );
    }

    #[test]
    fn no_mentions_returns_empty() {
        assert!(parse_mentions("Hello everyone").is_empty());
    }

    #[test]
    fn email_like_text_still_yields_a_token() {
        // The parser does not special-case emails; this documents the
        // actual (permissive) behavior rather than asserting immunity.
        assert_eq!(parse_mentions("contact me@example.com"), vec!["example.com"]);
    }
}
