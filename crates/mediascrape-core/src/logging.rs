//! Structured logging field name constants for mediascrape.
//!
//! All crates use these constants for consistent structured logging fields so
//! log aggregation can query by the same names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue (e.g. a fetch failure recorded on a target) |
//! | INFO  | Lifecycle events (startup, shutdown), job and target completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (extracted media, feed ticks) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "db", "scraper", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "worker", "orchestrator", "fetcher", "media_feed", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "submit", "record_outcome", "claim", "fetch"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Scrape job UUID.
pub const JOB_ID: &str = "job_id";

/// Queue task UUID.
pub const TASK_ID: &str = "task_id";

/// Normalized page URL being processed.
pub const SOURCE_URL: &str = "source_url";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of media references extracted from a page.
pub const MEDIA_COUNT: &str = "media_count";

/// Number of media rows actually inserted (duplicates excluded).
pub const INSERTED_COUNT: &str = "inserted_count";

/// Body length in characters after truncation.
pub const BODY_CHARS: &str = "body_chars";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
