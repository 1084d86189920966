//! Job orchestration: submission, outcome accounting and status queries.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use mediascrape_core::env::env_clamped;
use mediascrape_core::{
    defaults, normalize_batch, Error, EventBus, MediaFilter, MediaPage, MediaQuery, Result,
    ScrapeJob, ScrapeTarget, ServerEvent, Store, SubmitResponse,
};

use crate::feed::{self, FeedConfig, MediaFeedEvent, ProgressEvent};

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Raw URLs considered per submission; the rest are ignored.
    pub max_urls_per_request: usize,
    pub feed: FeedConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_urls_per_request: defaults::MAX_URLS_PER_REQUEST,
            feed: FeedConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default | Bounds |
    /// |----------|---------|--------|
    /// | `MAX_URLS_PER_REQUEST` | `50` | 1..=200 |
    ///
    /// Feed settings come from [`FeedConfig::from_env`].
    pub fn from_env() -> Self {
        Self {
            max_urls_per_request: env_clamped(
                "MAX_URLS_PER_REQUEST",
                defaults::MAX_URLS_PER_REQUEST,
                1,
                defaults::MAX_URLS_PER_REQUEST_CAP,
            ),
            feed: FeedConfig::from_env(),
        }
    }

    pub fn with_max_urls(mut self, max: usize) -> Self {
        self.max_urls_per_request = max;
        self
    }

    pub fn with_feed(mut self, feed: FeedConfig) -> Self {
        self.feed = feed;
        self
    }
}

/// Owns job creation and the job's aggregate counters.
///
/// Every counter mutation goes through [`JobOrchestrator::record_outcome`],
/// which delegates to the store's serialized increment.
#[derive(Clone)]
pub struct JobOrchestrator {
    store: Store,
    config: OrchestratorConfig,
    events: Option<Arc<EventBus>>,
}

impl JobOrchestrator {
    pub fn new(store: Store, config: OrchestratorConfig) -> Self {
        Self {
            store,
            config,
            events: None,
        }
    }

    /// Publish `job.queued` events on `bus`.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Normalize the raw URLs, create the job with one target per distinct
    /// URL, and enqueue one task per target.
    #[instrument(skip(self, raw_urls), fields(subsystem = "jobs", component = "orchestrator", op = "submit"))]
    pub async fn submit<S: AsRef<str>>(&self, raw_urls: &[S]) -> Result<SubmitResponse> {
        let start = Instant::now();
        let urls = normalize_batch(raw_urls, self.config.max_urls_per_request)?;

        let job = self.store.jobs.create_with_targets(&urls).await?;
        let enqueued = match self.store.tasks.enqueue(job.id, &urls).await {
            Ok(n) if n == urls.len() => n,
            Ok(n) => {
                let err = Error::Queue(format!(
                    "enqueued {n} of {} tasks for job {}",
                    urls.len(),
                    job.id
                ));
                self.discard(job.id, &err).await;
                return Err(err);
            }
            Err(err) => {
                self.discard(job.id, &err).await;
                return Err(err);
            }
        };

        self.emit(ServerEvent::JobQueued {
            job_id: job.id,
            total_targets: job.total_targets,
        });

        info!(
            job_id = %job.id,
            submitted = raw_urls.len(),
            accepted = enqueued,
            duration_ms = start.elapsed().as_millis() as u64,
            "Job submitted"
        );

        Ok(SubmitResponse {
            job_id: job.id,
            accepted: enqueued,
        })
    }

    /// Remove a job whose tasks could not be enqueued, so it never lingers
    /// in `queued`. Tasks that did get enqueued find no target and are
    /// skipped.
    async fn discard(&self, job_id: Uuid, cause: &Error) {
        match self.store.jobs.delete(job_id).await {
            Ok(_) => warn!(
                subsystem = "jobs",
                component = "orchestrator",
                job_id = %job_id,
                error = %cause,
                "Enqueue failed, job discarded"
            ),
            Err(e) => error!(
                subsystem = "jobs",
                component = "orchestrator",
                job_id = %job_id,
                error = %cause,
                delete_error = %e,
                "Enqueue failed and job could not be discarded"
            ),
        }
    }

    /// Count one finished target and return the resulting snapshot.
    pub async fn record_outcome(&self, job_id: Uuid, ok: bool) -> Result<ScrapeJob> {
        let job = self.store.jobs.record_outcome(job_id, ok).await?;
        debug!(
            subsystem = "jobs",
            component = "orchestrator",
            job_id = %job_id,
            ok,
            status = %job.status,
            done_targets = job.done_targets,
            failed_targets = job.failed_targets,
            total_targets = job.total_targets,
            "Outcome recorded"
        );

        if job.status.is_terminal() {
            info!(
                subsystem = "jobs",
                component = "orchestrator",
                job_id = %job_id,
                status = %job.status,
                done_targets = job.done_targets,
                failed_targets = job.failed_targets,
                "Job finished"
            );
        }
        Ok(job)
    }

    /// Current snapshot of a job.
    pub async fn status(&self, job_id: Uuid) -> Result<ScrapeJob> {
        self.store
            .jobs
            .get(job_id)
            .await?
            .ok_or(Error::JobNotFound(job_id))
    }

    /// Targets of an existing job.
    pub async fn targets(&self, job_id: Uuid) -> Result<Vec<ScrapeTarget>> {
        self.status(job_id).await?;
        self.store.targets.list_for_job(job_id).await
    }

    pub async fn list_media(&self, query: &MediaQuery) -> Result<MediaPage> {
        self.store.media.list(query).await
    }

    /// Delete every job, target and media item.
    pub async fn clear_all(&self) -> Result<()> {
        self.store.jobs.clear_all().await?;
        info!(subsystem = "jobs", component = "orchestrator", "All jobs and media cleared");
        Ok(())
    }

    /// Start a progress feed for one job.
    pub fn watch_progress(&self, job_id: Uuid) -> mpsc::Receiver<ProgressEvent> {
        feed::watch_progress(self.store.clone(), job_id, self.config.feed.clone())
    }

    /// Start a media feed for the given filter.
    pub fn watch_media(&self, filter: MediaFilter) -> mpsc::Receiver<MediaFeedEvent> {
        feed::watch_media(self.store.clone(), filter, self.config.feed.clone())
    }

    fn emit(&self, event: ServerEvent) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("config", &self.config)
            .field("events", &self.events.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use mediascrape_core::{JobRepository, JobStatus, ScrapeTask, TargetRepository, TaskQueue};
    use mediascrape_db::MemoryStore;
    use tokio::sync::Notify;

    fn orchestrator() -> JobOrchestrator {
        JobOrchestrator::new(MemoryStore::new().into_store(), OrchestratorConfig::default())
    }

    #[test]
    fn test_config_defaults_and_builders() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_urls_per_request, 50);

        let config = config.with_max_urls(3);
        assert_eq!(config.max_urls_per_request, 3);
    }

    #[tokio::test]
    async fn test_submit_counts_distinct_normalized_urls() {
        let orch = orchestrator();
        let resp = orch
            .submit(&["example.com", "https://example.com/", "not a url"])
            .await
            .unwrap();
        assert_eq!(resp.accepted, 2);

        let job = orch.status(resp.job_id).await.unwrap();
        assert_eq!(job.total_targets, 2);
        assert_eq!(job.status, JobStatus::Queued);

        let targets = orch.targets(resp.job_id).await.unwrap();
        let urls: Vec<_> = targets.iter().map(|t| t.source_url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com", "https://example.com/"]);

        assert_eq!(orch.store().tasks.pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_submit_rejects_all_invalid() {
        let orch = orchestrator();
        let err = orch.submit(&["not a url", "   ", "ftp://x.test"]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(orch.store().tasks.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_submit_respects_url_cap() {
        let orch = JobOrchestrator::new(
            MemoryStore::new().into_store(),
            OrchestratorConfig::default().with_max_urls(2),
        );
        let resp = orch
            .submit(&["a.test", "b.test", "c.test"])
            .await
            .unwrap();
        assert_eq!(resp.accepted, 2);
    }

    #[tokio::test]
    async fn test_outcomes_ok_fail_ok_end_failed() {
        let orch = orchestrator();
        let resp = orch.submit(&["a.test", "b.test", "c.test"]).await.unwrap();

        let job = orch.record_outcome(resp.job_id, true).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        orch.record_outcome(resp.job_id, false).await.unwrap();
        let job = orch.record_outcome(resp.job_id, true).await.unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.done_targets, 2);
        assert_eq!(job.failed_targets, 1);
    }

    #[tokio::test]
    async fn test_status_and_targets_unknown_job() {
        let orch = orchestrator();
        let id = Uuid::now_v7();
        assert!(matches!(orch.status(id).await, Err(Error::JobNotFound(_))));
        assert!(matches!(orch.targets(id).await, Err(Error::JobNotFound(_))));
    }

    #[tokio::test]
    async fn test_submit_publishes_job_queued() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let orch = orchestrator().with_events(bus);

        let resp = orch.submit(&["a.test", "b.test"]).await.unwrap();

        let queued = rx.recv().await.unwrap();
        assert_eq!(queued.event_type, "job.queued");
        assert_eq!(queued.job_id, resp.job_id);
        assert_eq!(
            queued.payload,
            ServerEvent::JobQueued {
                job_id: resp.job_id,
                total_targets: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_clear_all_removes_jobs() {
        let orch = orchestrator();
        let resp = orch.submit(&["a.test"]).await.unwrap();
        orch.clear_all().await.unwrap();
        assert!(matches!(orch.status(resp.job_id).await, Err(Error::JobNotFound(_))));
    }

    /// Queue that accepts at most `accept` tasks per call, or fails outright.
    struct BrokenQueue {
        accept: Option<usize>,
    }

    #[async_trait]
    impl TaskQueue for BrokenQueue {
        async fn enqueue(&self, _job_id: Uuid, urls: &[String]) -> Result<usize> {
            match self.accept {
                Some(n) => Ok(n.min(urls.len())),
                None => Err(Error::Queue("transport down".to_string())),
            }
        }

        async fn claim(&self) -> Result<Option<ScrapeTask>> {
            Ok(None)
        }

        async fn ack(&self, _task_id: Uuid) -> Result<()> {
            Ok(())
        }

        async fn pending_count(&self) -> Result<i64> {
            Ok(0)
        }

        fn notifier(&self) -> Arc<Notify> {
            Arc::new(Notify::new())
        }
    }

    /// Job repository that remembers the ids it created.
    struct RecordingJobs {
        inner: Arc<MemoryStore>,
        created: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl JobRepository for RecordingJobs {
        async fn create_with_targets(&self, urls: &[String]) -> Result<ScrapeJob> {
            let job = self.inner.create_with_targets(urls).await?;
            self.created.lock().unwrap().push(job.id);
            Ok(job)
        }

        async fn get(&self, job_id: Uuid) -> Result<Option<ScrapeJob>> {
            self.inner.get(job_id).await
        }

        async fn record_outcome(&self, job_id: Uuid, ok: bool) -> Result<ScrapeJob> {
            JobRepository::record_outcome(self.inner.as_ref(), job_id, ok).await
        }

        async fn delete(&self, job_id: Uuid) -> Result<bool> {
            self.inner.delete(job_id).await
        }

        async fn clear_all(&self) -> Result<()> {
            self.inner.clear_all().await
        }
    }

    fn with_queue(queue: BrokenQueue) -> (JobOrchestrator, Arc<RecordingJobs>) {
        let backend = Arc::new(MemoryStore::new());
        let jobs = Arc::new(RecordingJobs {
            inner: backend.clone(),
            created: Mutex::new(Vec::new()),
        });
        let mut store = Store::from_backend(backend);
        store.jobs = jobs.clone();
        store.tasks = Arc::new(queue);
        (JobOrchestrator::new(store, OrchestratorConfig::default()), jobs)
    }

    #[tokio::test]
    async fn test_enqueue_failure_leaves_no_job_behind() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let (orch, jobs) = with_queue(BrokenQueue { accept: None });
        let orch = orch.with_events(bus);

        let err = orch.submit(&["a.test", "b.test"]).await.unwrap_err();
        assert!(matches!(err, Error::Queue(_)));

        let created = jobs.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert!(matches!(orch.status(created[0]).await, Err(Error::JobNotFound(_))));
        assert!(jobs.inner.list_for_job(created[0]).await.unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_partial_enqueue_discards_job() {
        let (orch, jobs) = with_queue(BrokenQueue { accept: Some(1) });

        let err = orch.submit(&["a.test", "b.test"]).await.unwrap_err();
        assert!(matches!(err, Error::Queue(ref msg) if msg.contains("1 of 2")));

        let created = jobs.created.lock().unwrap().clone();
        assert!(matches!(orch.status(created[0]).await, Err(Error::JobNotFound(_))));
    }
}
