//! Free-text media search.
//!
//! A search string is split on whitespace into tokens and every token must
//! match (AND). A token matches when any of its variants is a
//! case-insensitive substring of the item's source URL or media URL.
//! Variants cover the scheme-less and trailing-slash-less spellings, so
//! `https://x.com/` finds items stored under `https://x.com` and vice versa.

use once_cell::sync::Lazy;
use regex::Regex;

static SCHEME_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://").expect("valid scheme prefix regex"));

/// Expand one token into its match variants, first-seen order, no empties.
pub fn expand_search_token(token: &str) -> Vec<String> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let no_scheme = SCHEME_PREFIX_RE.replace(trimmed, "").into_owned();
    let candidates = [
        trimmed.to_string(),
        no_scheme.clone(),
        trimmed.trim_end_matches('/').to_string(),
        no_scheme.trim_end_matches('/').to_string(),
    ];

    let mut out: Vec<String> = Vec::with_capacity(candidates.len());
    for c in candidates {
        if !c.is_empty() && !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

/// Split a search string into per-token variant groups.
///
/// Every group must match (AND); any variant within a group suffices (OR).
/// A blank search yields no groups, i.e. no restriction.
pub fn search_groups(search: &str) -> Vec<Vec<String>> {
    search
        .split_whitespace()
        .map(expand_search_token)
        .filter(|g| !g.is_empty())
        .collect()
}

/// Escape `LIKE` wildcards (`%`, `_`) and the escape character itself.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Evaluate search groups against one item in memory.
pub fn matches_search(groups: &[Vec<String>], source_url: &str, media_url: &str) -> bool {
    let source = source_url.to_lowercase();
    let media = media_url.to_lowercase();
    groups.iter().all(|variants| {
        variants.iter().any(|v| {
            let v = v.to_lowercase();
            source.contains(&v) || media.contains(&v)
        })
    })
}
