//! Centralized default constants for the mediascrape system.
//!
//! All crates reference these constants instead of defining their own magic
//! numbers. Environment overrides are applied by each component's
//! `from_env()` constructor.

// =============================================================================
// SUBMISSION
// =============================================================================

/// Maximum URLs accepted per submission; extra entries are truncated.
pub const MAX_URLS_PER_REQUEST: usize = 50;

/// Upper bound accepted for `MAX_URLS_PER_REQUEST`.
pub const MAX_URLS_PER_REQUEST_CAP: usize = 200;

// =============================================================================
// WORKER POOL
// =============================================================================

/// Default number of targets processed concurrently.
pub const SCRAPE_CONCURRENCY: usize = 25;

/// Upper bound accepted for `SCRAPE_CONCURRENCY`.
pub const SCRAPE_CONCURRENCY_CAP: usize = 1000;

/// Idle polling interval when the task queue is empty (milliseconds).
pub const WORKER_POLL_INTERVAL_MS: u64 = 500;

/// How long a claimed task stays invisible before it is redelivered.
pub const TASK_LEASE_SECS: u64 = 120;

// =============================================================================
// FETCHING
// =============================================================================

/// Deadline for one page fetch, headers and body together (milliseconds).
pub const FETCH_TIMEOUT_MS: u64 = 8000;

/// Smallest accepted fetch timeout (milliseconds).
pub const FETCH_TIMEOUT_MIN_MS: u64 = 1000;

/// Largest accepted fetch timeout (milliseconds).
pub const FETCH_TIMEOUT_MAX_MS: u64 = 60_000;

/// Maximum characters of HTML kept per page; the rest is dropped.
pub const FETCH_MAX_BODY_CHARS: usize = 1_000_000;

/// Identifying User-Agent sent with every fetch.
pub const FETCH_USER_AGENT: &str = "media-scraper/1.0";

/// Accept header sent with every fetch.
pub const FETCH_ACCEPT: &str = "text/html,application/xhtml+xml";

// =============================================================================
// STREAMING
// =============================================================================

/// Interval between feed polls (milliseconds).
pub const STREAM_INTERVAL_MS: u64 = 1000;

/// Maximum media items delivered per media feed tick.
pub const MEDIA_STREAM_BATCH: i64 = 200;

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Buffered feed events per watcher before the poller waits.
pub const FEED_CHANNEL_CAPACITY: usize = 16;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default media page size.
pub const PAGE_LIMIT: i64 = 24;

/// Largest media page size.
pub const PAGE_LIMIT_MAX: i64 = 100;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8080;

/// Maximum request body size in bytes.
pub const MAX_BODY_SIZE_BYTES: usize = 1_000_000;

/// SSE keep-alive interval for the event bus stream (seconds).
pub const SSE_KEEPALIVE_SECS: u64 = 15;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum pooled connections.
pub const DB_MAX_CONNECTIONS: u32 = 20;
