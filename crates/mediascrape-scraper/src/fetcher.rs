//! HTTP page fetcher.

use std::error::Error as StdError;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use tracing::{debug, trace};

use mediascrape_core::{defaults, Error, Fetcher, Result};

use crate::config::FetchConfig;

/// reqwest-based [`Fetcher`].
///
/// Redirects are followed. HTTP error statuses and non-HTML content types do
/// not fail the fetch: whatever body arrives is handed to the extractor.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn fetch_body(&self, url: &str) -> Result<String> {
        let mut response = self
            .client
            .get(url)
            .header(ACCEPT, defaults::FETCH_ACCEPT)
            .send()
            .await
            .map_err(describe)?;

        debug!(
            subsystem = "scraper",
            component = "fetcher",
            source_url = url,
            status = response.status().as_u16(),
            content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(""),
            "Response headers received"
        );

        let max_bytes = self.config.max_body_bytes();
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(describe)? {
            let room = max_bytes - buf.len();
            if chunk.len() >= room {
                buf.extend_from_slice(&chunk[..room]);
                trace!(source_url = url, max_bytes, "Body byte cap reached, stop reading");
                break;
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(truncate_chars(
            String::from_utf8_lossy(&buf).into_owned(),
            self.config.max_body_chars,
        ))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.config.timeout, self.fetch_body(url)).await {
            Ok(result) => result,
            Err(_) => Err(Error::FetchTimeout(self.config.timeout_ms())),
        };

        match &result {
            Ok(body) => debug!(
                subsystem = "scraper",
                component = "fetcher",
                op = "fetch",
                source_url = url,
                body_chars = body.chars().count(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Fetched page"
            ),
            Err(e) => debug!(
                subsystem = "scraper",
                component = "fetcher",
                op = "fetch",
                source_url = url,
                error = %e,
                duration_ms = start.elapsed().as_millis() as u64,
                "Fetch failed"
            ),
        }
        result
    }
}

/// Map a reqwest error to `Error::Fetch`, keeping the underlying cause.
fn describe(err: reqwest::Error) -> Error {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    Error::Fetch(msg)
}

/// Keep at most `max_chars` characters.
fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_ascii() {
        assert_eq!(truncate_chars("abcdef".to_string(), 3), "abc");
        assert_eq!(truncate_chars("abc".to_string(), 3), "abc");
        assert_eq!(truncate_chars("ab".to_string(), 3), "ab");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo".to_string(), 2), "hé");
        assert_eq!(truncate_chars("日本語テキスト".to_string(), 3), "日本語");
    }

    #[test]
    fn test_new_builds_client() {
        let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
        assert_eq!(fetcher.config().max_body_chars, 1_000_000);
    }
}
