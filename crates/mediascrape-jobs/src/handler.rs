//! Task handler trait and the target processor.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use mediascrape_core::{
    Fetcher, Result, ScrapeJob, ScrapeTask, Store, TargetClaim, TargetOutcome,
};
use mediascrape_scraper::extract_media;

use crate::orchestrator::JobOrchestrator;

/// Context passed to a task handler.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task: ScrapeTask,
}

impl TaskContext {
    pub fn new(task: ScrapeTask) -> Self {
        Self { task }
    }

    /// Whether this delivery is a redelivery of an earlier claim.
    pub fn is_redelivery(&self) -> bool {
        self.task.attempts > 1
    }
}

/// Result of handling one task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    /// Page fetched, media stored, target `done`.
    Done {
        media_found: usize,
        inserted: u64,
        /// Job snapshot after recording the outcome, if this run recorded it.
        job: Option<ScrapeJob>,
    },
    /// Fetch failed, target `failed`.
    Failed {
        error: String,
        job: Option<ScrapeJob>,
    },
    /// Nothing to do: the target already finished or no longer exists.
    Skipped,
    /// Infrastructure error; leave the task on the queue for redelivery.
    Retry(String),
}

impl TaskResult {
    /// Whether the task should be acknowledged.
    pub fn should_ack(&self) -> bool {
        !matches!(self, TaskResult::Retry(_))
    }
}

/// Trait for task handlers.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Execute the task.
    async fn execute(&self, ctx: TaskContext) -> TaskResult;
}

/// Runs one target through `queued -> processing -> {done, failed}`.
///
/// Safe under redelivery: a target that already finished is skipped, and the
/// job counter is only touched when this run performed the final transition.
pub struct TargetProcessor {
    orchestrator: JobOrchestrator,
    fetcher: Arc<dyn Fetcher>,
}

impl TargetProcessor {
    pub fn new(orchestrator: JobOrchestrator, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            orchestrator,
            fetcher,
        }
    }

    fn store(&self) -> &Store {
        self.orchestrator.store()
    }

    async fn process(&self, task: &ScrapeTask) -> Result<TaskResult> {
        let store = self.store();

        match store.targets.begin(task.job_id, &task.url).await? {
            TargetClaim::Started => {}
            claim => {
                debug!(
                    subsystem = "jobs",
                    component = "processor",
                    job_id = %task.job_id,
                    source_url = %task.url,
                    attempts = task.attempts,
                    ?claim,
                    "Skipping target"
                );
                return Ok(TaskResult::Skipped);
            }
        }

        let start = Instant::now();
        let (outcome, media_found, inserted) = match self.fetcher.fetch(&task.url).await {
            Ok(html) => {
                let media = extract_media(&html, &task.url);
                let inserted = store
                    .media
                    .insert_if_absent(task.job_id, &task.url, &media)
                    .await?;
                (TargetOutcome::Done, media.len(), inserted)
            }
            Err(e) if e.is_fetch_failure() => (TargetOutcome::Failed(e.to_string()), 0, 0),
            Err(e) => return Err(e),
        };

        let transitioned = store
            .targets
            .finish(task.job_id, &task.url, &outcome)
            .await?;
        let job = if transitioned {
            Some(
                self.orchestrator
                    .record_outcome(task.job_id, outcome.is_ok())
                    .await?,
            )
        } else {
            debug!(
                job_id = %task.job_id,
                source_url = %task.url,
                "Target finished concurrently, outcome not counted again"
            );
            None
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        Ok(match outcome {
            TargetOutcome::Done => {
                info!(
                    subsystem = "jobs",
                    component = "processor",
                    job_id = %task.job_id,
                    source_url = %task.url,
                    media_count = media_found,
                    inserted_count = inserted,
                    duration_ms,
                    "Target done"
                );
                TaskResult::Done {
                    media_found,
                    inserted,
                    job,
                }
            }
            TargetOutcome::Failed(error) => {
                warn!(
                    subsystem = "jobs",
                    component = "processor",
                    job_id = %task.job_id,
                    source_url = %task.url,
                    error = %error,
                    duration_ms,
                    "Target failed"
                );
                TaskResult::Failed { error, job }
            }
        })
    }
}

#[async_trait]
impl TaskHandler for TargetProcessor {
    async fn execute(&self, ctx: TaskContext) -> TaskResult {
        if ctx.is_redelivery() {
            debug!(task_id = %ctx.task.id, attempts = ctx.task.attempts, "Redelivered task");
        }
        match self.process(&ctx.task).await {
            Ok(result) => result,
            Err(e) => TaskResult::Retry(e.to_string()),
        }
    }
}

/// Handler that acknowledges every task without doing anything.
pub struct NoOpHandler;

#[async_trait]
impl TaskHandler for NoOpHandler {
    async fn execute(&self, _ctx: TaskContext) -> TaskResult {
        TaskResult::Skipped
    }
}
