//! Server configuration.

use std::str::FromStr;

use axum::http::HeaderValue;
use tower_http::cors::AllowOrigin;
use tracing::warn;

use mediascrape_core::env::env_parse;
use mediascrape_core::{defaults, Error, Result};

/// Where jobs, targets, media and tasks are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local, lost on restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(Error::Config(format!(
                "unknown STORAGE_BACKEND '{other}', expected postgres or memory"
            ))),
        }
    }
}

/// Allowed CORS origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Parse a comma separated list; `*` or an empty value allows any origin.
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::List(origins)
        }
    }

    pub fn to_allow_origin(&self) -> AllowOrigin {
        match self {
            AllowedOrigins::Any => AllowOrigin::any(),
            AllowedOrigins::List(origins) => {
                let values: Vec<HeaderValue> = origins
                    .iter()
                    .filter_map(|o| match o.parse::<HeaderValue>() {
                        Ok(v) => Some(v),
                        Err(e) => {
                            warn!("Invalid CORS origin '{}': {}", o, e);
                            None
                        }
                    })
                    .collect();
                AllowOrigin::list(values)
            }
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub storage_backend: StorageBackend,
    pub allowed_origins: AllowedOrigins,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: defaults::SERVER_PORT,
            database_url: "postgres://localhost/mediascrape".to_string(),
            storage_backend: StorageBackend::Postgres,
            allowed_origins: AllowedOrigins::Any,
            max_body_bytes: defaults::MAX_BODY_SIZE_BYTES,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `HOST` | `0.0.0.0` |
    /// | `PORT` | `8080` |
    /// | `DATABASE_URL` | `postgres://localhost/mediascrape` |
    /// | `STORAGE_BACKEND` | `postgres` (`postgres` or `memory`) |
    /// | `ALLOWED_ORIGINS` | `*` |
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let storage_backend = match std::env::var("STORAGE_BACKEND") {
            Ok(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => defaults.storage_backend,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT", defaults.port),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            storage_backend,
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .map(|raw| AllowedOrigins::parse(&raw))
                .unwrap_or(defaults.allowed_origins),
            max_body_bytes: defaults.max_body_bytes,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
