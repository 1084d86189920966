//! Error types for mediascrape.

use thiserror::Error;

/// Result type alias using mediascrape's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for mediascrape operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Scrape job not found
    #[error("Job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// Invalid input (submission or query validation)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Page fetch failed (network, DNS, TLS, connection, body read)
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Page fetch exceeded its deadline
    #[error("Fetch timed out after {0}ms")]
    FetchTimeout(u64),

    /// Task queue error
    #[error("Queue error: {0}")]
    Queue(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is a per-target fetch failure (as opposed to an
    /// infrastructure failure that should leave the task for redelivery).
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Error::Fetch(_) | Error::FetchTimeout(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Fetch(e.to_string())
    }
}
