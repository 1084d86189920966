//! Fetcher configuration.

use std::time::Duration;

use mediascrape_core::defaults;
use mediascrape_core::env::env_clamped;

/// Page fetcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Deadline covering connect, headers and body.
    pub timeout: Duration,
    /// Characters of HTML kept per page.
    pub max_body_chars: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(defaults::FETCH_TIMEOUT_MS),
            max_body_chars: defaults::FETCH_MAX_BODY_CHARS,
            user_agent: defaults::FETCH_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default | Bounds |
    /// |----------|---------|--------|
    /// | `FETCH_TIMEOUT_MS` | `8000` | 1000..=60000 |
    /// | `FETCH_MAX_BODY_CHARS` | `1000000` | >= 1 |
    /// | `FETCH_USER_AGENT` | `media-scraper/1.0` | |
    pub fn from_env() -> Self {
        let timeout_ms = env_clamped(
            "FETCH_TIMEOUT_MS",
            defaults::FETCH_TIMEOUT_MS,
            defaults::FETCH_TIMEOUT_MIN_MS,
            defaults::FETCH_TIMEOUT_MAX_MS,
        );
        let max_body_chars =
            env_clamped("FETCH_MAX_BODY_CHARS", defaults::FETCH_MAX_BODY_CHARS, 1, usize::MAX);
        let user_agent = std::env::var("FETCH_USER_AGENT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::FETCH_USER_AGENT.to_string());

        Self {
            timeout: Duration::from_millis(timeout_ms),
            max_body_chars,
            user_agent,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_body_chars(mut self, max: usize) -> Self {
        self.max_body_chars = max;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Upper bound on raw bytes buffered before decoding.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_chars.saturating_mul(4)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, Duration::from_millis(8000));
        assert_eq!(config.max_body_chars, 1_000_000);
        assert_eq!(config.user_agent, "media-scraper/1.0");
        assert_eq!(config.max_body_bytes(), 4_000_000);
    }

    #[test]
    fn test_builders() {
        let config = FetchConfig::default()
            .with_timeout(Duration::from_millis(1500))
            .with_max_body_chars(10)
            .with_user_agent("test-agent");
        assert_eq!(config.timeout_ms(), 1500);
        assert_eq!(config.max_body_chars, 10);
        assert_eq!(config.user_agent, "test-agent");
    }
}
