//! Core traits for mediascrape abstractions.
//!
//! These traits define the persistent store, task queue and fetcher
//! boundaries. `mediascrape-db` provides PostgreSQL and in-memory
//! implementations; `mediascrape-scraper` provides the HTTP fetcher.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// TARGET STATE TRANSITIONS
// =============================================================================

/// Result of moving a target to `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetClaim {
    /// The target is now (or already was) `processing`.
    Started,
    /// The target already reached `done` or `failed`; nothing left to do.
    AlreadyFinished,
    /// No target exists for this job and URL (e.g. cleared meanwhile).
    NotFound,
}

/// Final outcome of processing one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Done,
    Failed(String),
}

impl TargetOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, TargetOutcome::Done)
    }

    pub fn status(&self) -> TargetStatus {
        match self {
            TargetOutcome::Done => TargetStatus::Done,
            TargetOutcome::Failed(_) => TargetStatus::Failed,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            TargetOutcome::Done => None,
            TargetOutcome::Failed(msg) => Some(msg),
        }
    }
}

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

/// Repository for scrape jobs and their aggregate counters.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Create a job (`queued`, `total_targets = urls.len()`) and one `queued`
    /// target per URL in a single unit. URLs must already be deduplicated.
    async fn create_with_targets(&self, urls: &[String]) -> Result<ScrapeJob>;

    /// Get a job snapshot.
    async fn get(&self, job_id: Uuid) -> Result<Option<ScrapeJob>>;

    /// Atomically increment `done_targets` (ok) or `failed_targets` and
    /// recompute the status in the same serialized update.
    ///
    /// Once every target has an outcome the counters are frozen and the
    /// unchanged snapshot is returned. Returns `Error::JobNotFound` for an
    /// unknown job.
    async fn record_outcome(&self, job_id: Uuid, ok: bool) -> Result<ScrapeJob>;

    /// Delete one job together with its targets and media. Returns `false`
    /// when the job did not exist.
    async fn delete(&self, job_id: Uuid) -> Result<bool>;

    /// Delete every job together with its targets and media.
    async fn clear_all(&self) -> Result<()>;
}

/// Repository for per-URL targets.
#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// Move the target from `queued` to `processing`.
    async fn begin(&self, job_id: Uuid, source_url: &str) -> Result<TargetClaim>;

    /// Move the target from `queued`/`processing` to its terminal status.
    ///
    /// Returns `true` only when this call performed the transition; a target
    /// that was already terminal is left untouched and `false` is returned.
    async fn finish(&self, job_id: Uuid, source_url: &str, outcome: &TargetOutcome)
        -> Result<bool>;

    /// List the targets of a job in creation order.
    async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<ScrapeTarget>>;
}

/// Repository for extracted media.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Insert items that are not stored yet; `(source_url, media_url, type)`
    /// duplicates are skipped silently. Returns the number of rows inserted.
    async fn insert_if_absent(
        &self,
        job_id: Uuid,
        source_url: &str,
        items: &[ExtractedMedia],
    ) -> Result<u64>;

    /// Page through media matching the query, newest first.
    async fn list(&self, query: &MediaQuery) -> Result<MediaPage>;

    /// Media matching the filter that sort strictly after `after`, oldest
    /// first, at most `limit` items.
    async fn list_after(
        &self,
        filter: &MediaFilter,
        after: Option<MediaCursor>,
        limit: i64,
    ) -> Result<Vec<MediaItem>>;
}

// =============================================================================
// TASK QUEUE
// =============================================================================

/// At-least-once task transport feeding the worker pool.
///
/// A claimed task stays invisible for a lease period. A task that is not
/// acknowledged before its lease expires is delivered again.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue one task per URL for the job. Returns the number enqueued.
    async fn enqueue(&self, job_id: Uuid, urls: &[String]) -> Result<usize>;

    /// Claim the next available task, if any.
    async fn claim(&self) -> Result<Option<ScrapeTask>>;

    /// Acknowledge a task, removing it from the queue.
    async fn ack(&self, task_id: Uuid) -> Result<()>;

    /// Number of tasks not yet acknowledged.
    async fn pending_count(&self) -> Result<i64>;

    /// Signalled whenever new tasks are enqueued.
    fn notifier(&self) -> Arc<Notify>;
}

// =============================================================================
// FETCHER
// =============================================================================

/// Retrieves the HTML of a page within size and time bounds.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`. Network failures map to `Error::Fetch`, deadline expiry
    /// to `Error::FetchTimeout`.
    async fn fetch(&self, url: &str) -> Result<String>;
}

// =============================================================================
// STORE BUNDLE
// =============================================================================

/// Cloneable bundle of the repositories and queue the pipeline runs on.
#[derive(Clone)]
pub struct Store {
    pub jobs: Arc<dyn JobRepository>,
    pub targets: Arc<dyn TargetRepository>,
    pub media: Arc<dyn MediaRepository>,
    pub tasks: Arc<dyn TaskQueue>,
}

impl Store {
    /// Build a store from one backend implementing every repository.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: JobRepository + TargetRepository + MediaRepository + TaskQueue + 'static,
    {
        Self {
            jobs: backend.clone(),
            targets: backend.clone(),
            media: backend.clone(),
            tasks: backend,
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}
