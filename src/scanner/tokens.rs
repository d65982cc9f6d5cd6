//! Identity/reference token extraction.
//!
//! A token is a run of 32 lowercase hex characters following one of two
//! labels: `guid: ` (sidecar metadata and inline asset references) or
//! `GUID:` (embedded definitions such as assembly definition references).

use regex::Regex;
use std::sync::OnceLock;

/// Length of an identity token.
pub const TOKEN_LEN: usize = 32;

fn token_regex() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| {
        // Capture the whole hex run so over-long or mixed-case runs can be rejected.
        Regex::new(r"(?:guid: |GUID:)([0-9a-fA-F]+)")
            .unwrap_or_else(|e| unreachable!("token pattern is valid: {e}"))
    })
}

/// All tokens in `text`, in order of appearance. Duplicates are kept.
pub fn extract_tokens(text: &str) -> Vec<String> {
    tokens(text).map(str::to_string).collect()
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    token_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|run| is_token(run))
}

/// Whether `s` has the shape of an identity token.
pub fn is_token(s: &str) -> bool {
    s.len() == TOKEN_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
