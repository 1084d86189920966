//! URL normalization for submitted scrape targets.
//!
//! A raw string becomes a canonical absolute http/https URL or is rejected.
//! Inputs without a scheme get `https://`. Serialization follows the WHATWG
//! URL rules of the `url` crate (lowercased scheme and host, default port
//! dropped, percent-encoding normalized) with one exception: an input that
//! had no path keeps having none, so `example.com` and `https://example.com/`
//! stay distinct targets.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use url::{Position, Url};

use crate::error::{Error, Result};

static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").expect("valid scheme regex"));

/// Normalize one raw URL string.
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("empty url".to_string()));
    }

    let with_scheme = if SCHEME_RE.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| Error::InvalidInput(format!("unparseable url {trimmed:?}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "unsupported scheme {:?} in {trimmed:?}",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::InvalidInput(format!("missing host in {trimmed:?}")));
    }

    if url.path() == "/" && !has_explicit_path(&with_scheme) {
        return Ok(format!(
            "{}{}",
            &url[..Position::AfterPort],
            &url[Position::AfterPath..]
        ));
    }
    Ok(url.to_string())
}

/// Whether the authority in `input` is followed by a `/`.
fn has_explicit_path(input: &str) -> bool {
    let Some(idx) = input.find("://") else {
        return true;
    };
    let rest = &input[idx + 3..];
    match rest.find(['/', '\\', '?', '#']) {
        Some(pos) => matches!(rest.as_bytes()[pos], b'/' | b'\\'),
        None => false,
    }
}

/// Normalize a submitted batch.
///
/// The batch is truncated to `max` entries before normalization; rejected
/// entries are dropped and duplicates (after normalization) collapse to their
/// first occurrence. Fails with `InvalidInput("No valid urls")` when nothing
/// survives.
pub fn normalize_batch<S: AsRef<str>>(raws: &[S], max: usize) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for raw in raws.iter().take(max) {
        match normalize_url(raw.as_ref()) {
            Ok(url) => {
                if seen.insert(url.clone()) {
                    out.push(url);
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Dropping rejected url");
            }
        }
    }

    if out.is_empty() {
        return Err(Error::InvalidInput("No valid urls".to_string()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepends_https_without_scheme() {
        assert_eq!(normalize_url("example.com").unwrap(), "https://example.com");
        assert_eq!(
            normalize_url("example.com/a/b").unwrap(),
            "https://example.com/a/b"
        );
    }

    #[test]
    fn test_keeps_trailing_slash_distinct() {
        assert_eq!(
            normalize_url("https://example.com/").unwrap(),
            "https://example.com/"
        );
        assert_eq!(
            normalize_url("https://example.com").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn test_trims_whitespace_and_lowercases_host() {
        assert_eq!(
            normalize_url("  HTTPS://Example.COM/Path  ").unwrap(),
            "https://example.com/Path"
        );
    }

    #[test]
    fn test_drops_default_port() {
        assert_eq!(
            normalize_url("http://example.com:80/x").unwrap(),
            "http://example.com/x"
        );
    }

    #[test]
    fn test_query_without_path() {
        assert_eq!(
            normalize_url("https://example.com?q=1").unwrap(),
            "https://example.com?q=1"
        );
    }

    #[test]
    fn test_rejects_empty_and_garbage() {
        assert!(normalize_url("").is_err());
        assert!(normalize_url("   ").is_err());
        assert!(normalize_url("not a url").is_err());
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        assert!(normalize_url("ftp://example.com/file").is_err());
        assert!(normalize_url("mailto:someone@example.com").is_err());
        assert!(normalize_url("javascript:alert(1)").is_err());
        assert!(normalize_url("data:text/html,hi").is_err());
    }

    #[test]
    fn test_batch_counts_distinct_valid_urls() {
        let urls = vec!["example.com", "https://example.com/", "not a url"];
        let out = normalize_batch(&urls, 50).unwrap();
        assert_eq!(out, vec!["https://example.com", "https://example.com/"]);
    }

    #[test]
    fn test_batch_dedupes_after_normalization() {
        let urls = vec!["example.com/a", "https://EXAMPLE.com/a", " example.com/a "];
        let out = normalize_batch(&urls, 50).unwrap();
        assert_eq!(out, vec!["https://example.com/a"]);
    }

    #[test]
    fn test_batch_truncates_before_normalizing() {
        let urls = vec!["not a url", "a.test", "b.test"];
        let out = normalize_batch(&urls, 2).unwrap();
        assert_eq!(out, vec!["https://a.test"]);
    }

    #[test]
    fn test_batch_all_invalid_is_rejected() {
        let urls = vec!["not a url", "ftp://x.test"];
        let err = normalize_batch(&urls, 50).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: No valid urls");

        let empty: Vec<String> = Vec::new();
        assert!(normalize_batch(&empty, 50).is_err());
    }
}
