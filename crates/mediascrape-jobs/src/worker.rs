//! Worker pool that drains the task queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use mediascrape_core::env::{env_bool, env_clamped};
use mediascrape_core::{defaults, Error, Result, ScrapeJob, ScrapeTask, TaskQueue};

use crate::handler::{TaskContext, TaskHandler, TaskResult};

/// Configuration for the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds while the queue is empty.
    pub poll_interval_ms: u64,
    /// Maximum number of tasks in flight.
    pub max_concurrent_tasks: usize,
    /// Whether to process tasks at all.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::WORKER_POLL_INTERVAL_MS,
            max_concurrent_tasks: defaults::SCRAPE_CONCURRENCY,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_ENABLED` | `true` | Enable/disable the in-process pool |
    /// | `SCRAPE_CONCURRENCY` | `25` | Max tasks in flight, clamped to 1..=1000 |
    /// | `WORKER_POLL_INTERVAL_MS` | `500` | Polling interval when queue is empty, >= 10 |
    pub fn from_env() -> Self {
        Self {
            poll_interval_ms: env_clamped(
                "WORKER_POLL_INTERVAL_MS",
                defaults::WORKER_POLL_INTERVAL_MS,
                10,
                u64::MAX,
            ),
            max_concurrent_tasks: env_clamped(
                "SCRAPE_CONCURRENCY",
                defaults::SCRAPE_CONCURRENCY,
                1,
                defaults::SCRAPE_CONCURRENCY_CAP,
            ),
            enabled: env_bool("WORKER_ENABLED", true),
        }
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the worker pool.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Worker started.
    WorkerStarted,
    /// A task was claimed and handed to the handler.
    TaskStarted {
        task_id: Uuid,
        job_id: Uuid,
        source_url: String,
    },
    /// The target finished `done`.
    TaskCompleted {
        task_id: Uuid,
        job_id: Uuid,
        source_url: String,
        media_found: usize,
        inserted: u64,
        job: Option<ScrapeJob>,
    },
    /// The target finished `failed`.
    TaskFailed {
        task_id: Uuid,
        job_id: Uuid,
        source_url: String,
        error: String,
        job: Option<ScrapeJob>,
    },
    /// The task hit an infrastructure error and stays queued.
    TaskRetry {
        task_id: Uuid,
        job_id: Uuid,
        source_url: String,
        error: String,
    },
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker to stop claiming tasks.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Signal shutdown and wait until in-flight tasks have drained.
    pub async fn shutdown_and_wait(self) -> Result<()> {
        // The worker may already have exited (e.g. disabled).
        let _ = self.shutdown_tx.send(()).await;
        self.join
            .await
            .map_err(|e| Error::Internal(format!("Worker task failed: {e}")))
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Pulls tasks from the queue and runs them on the handler, at most
/// `max_concurrent_tasks` at a time.
pub struct ScrapeWorker {
    tasks: Arc<dyn TaskQueue>,
    handler: Arc<dyn TaskHandler>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl ScrapeWorker {
    pub fn new(tasks: Arc<dyn TaskQueue>, handler: Arc<dyn TaskHandler>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            tasks,
            handler,
            config,
            event_tx,
        }
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let join = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
            join,
        }
    }

    /// Run the worker loop.
    ///
    /// A task is only claimed once a concurrency permit is free, so a full
    /// pool leaves work on the queue for other workers. An empty queue
    /// parks the loop until new tasks are enqueued or the poll interval
    /// elapses. On shutdown no further tasks are claimed and in-flight tasks
    /// run to completion.
    #[instrument(skip(self, shutdown_rx), fields(subsystem = "jobs", component = "worker"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Scrape worker is disabled, not starting");
            return;
        }

        let max_concurrent = self.config.max_concurrent_tasks.max(1);
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent,
            "Scrape worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let permits = Arc::new(Semaphore::new(max_concurrent));
        let notify = self.tasks.notifier();
        let mut in_flight = JoinSet::new();

        loop {
            while let Some(result) = in_flight.try_join_next() {
                if let Err(e) = result {
                    error!(error = ?e, "Scrape task panicked");
                }
            }

            let permit = tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Scrape worker received shutdown signal");
                    break;
                }
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            // Register interest before claiming so an enqueue that races an
            // empty claim still wakes us.
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.tasks.claim().await {
                Ok(Some(task)) => {
                    let worker = self.clone_refs();
                    in_flight.spawn(async move {
                        worker.execute_task(task).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!("Scrape worker received shutdown signal");
                            break;
                        }
                        _ = &mut notified => {
                            debug!("Woken by enqueue");
                        }
                        _ = sleep(poll_interval) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    error!(error = %e, "Failed to claim task");
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!("Scrape worker received shutdown signal");
                            break;
                        }
                        _ = sleep(poll_interval) => {}
                    }
                }
            }
        }

        if !in_flight.is_empty() {
            info!(in_flight = in_flight.len(), "Draining in-flight tasks");
        }
        while let Some(result) = in_flight.join_next().await {
            if let Err(e) = result {
                error!(error = ?e, "Scrape task panicked");
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Scrape worker stopped");
    }

    fn clone_refs(&self) -> ScrapeWorkerRef {
        ScrapeWorkerRef {
            tasks: self.tasks.clone(),
            handler: self.handler.clone(),
            event_tx: self.event_tx.clone(),
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Get the number of tasks not yet acknowledged.
    pub async fn pending_count(&self) -> Result<i64> {
        self.tasks.pending_count().await
    }
}

/// Lightweight reference bundle for executing a single task in a spawned task.
struct ScrapeWorkerRef {
    tasks: Arc<dyn TaskQueue>,
    handler: Arc<dyn TaskHandler>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl ScrapeWorkerRef {
    async fn execute_task(self, task: ScrapeTask) {
        let start = Instant::now();
        let task_id = task.id;
        let job_id = task.job_id;
        let source_url = task.url.clone();

        debug!(%task_id, %job_id, %source_url, attempts = task.attempts, "Processing task");
        let _ = self.event_tx.send(WorkerEvent::TaskStarted {
            task_id,
            job_id,
            source_url: source_url.clone(),
        });

        let result = self.handler.execute(TaskContext::new(task)).await;

        if result.should_ack() {
            if let Err(e) = self.tasks.ack(task_id).await {
                // The lease will expire and the task comes back; the handler
                // skips targets that already finished.
                error!(error = %e, %task_id, %job_id, "Failed to acknowledge task");
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let event = match result {
            TaskResult::Done {
                media_found,
                inserted,
                job,
            } => WorkerEvent::TaskCompleted {
                task_id,
                job_id,
                source_url,
                media_found,
                inserted,
                job,
            },
            TaskResult::Failed { error, job } => WorkerEvent::TaskFailed {
                task_id,
                job_id,
                source_url,
                error,
                job,
            },
            TaskResult::Skipped => {
                debug!(%task_id, %job_id, duration_ms, "Task skipped");
                return;
            }
            TaskResult::Retry(error) => {
                warn!(%task_id, %job_id, %source_url, %error, duration_ms, "Task left for redelivery");
                WorkerEvent::TaskRetry {
                    task_id,
                    job_id,
                    source_url,
                    error,
                }
            }
        };
        let _ = self.event_tx.send(event);
    }
}

/// Builder for creating a scrape worker.
pub struct WorkerBuilder {
    tasks: Arc<dyn TaskQueue>,
    config: WorkerConfig,
    handler: Option<Arc<dyn TaskHandler>>,
}

impl WorkerBuilder {
    pub fn new(tasks: Arc<dyn TaskQueue>) -> Self {
        Self {
            tasks,
            config: WorkerConfig::default(),
            handler: None,
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_handler<H: TaskHandler + 'static>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Build the worker. Fails when no handler was set.
    pub fn build(self) -> Result<ScrapeWorker> {
        let handler = self
            .handler
            .ok_or_else(|| Error::Config("worker has no task handler".into()))?;
        Ok(ScrapeWorker::new(self.tasks, handler, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::NoOpHandler;
    use mediascrape_db::MemoryStore;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.max_concurrent_tasks, 25);
        assert!(config.enabled);
    }

    #[test]
    fn test_worker_config_builder() {
        let config = WorkerConfig::default()
            .with_poll_interval(1000)
            .with_max_concurrent(8)
            .with_enabled(false);

        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.max_concurrent_tasks, 8);
        assert!(!config.enabled);
    }

    #[test]
    fn test_builder_requires_handler() {
        let store = MemoryStore::new().into_store();
        assert!(matches!(
            WorkerBuilder::new(store.tasks).build(),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_disabled_worker_exits_immediately() {
        let store = MemoryStore::new().into_store();
        let worker = WorkerBuilder::new(store.tasks)
            .with_config(WorkerConfig::default().with_enabled(false))
            .with_handler(NoOpHandler)
            .build()
            .unwrap();
        let handle = worker.start();
        handle.shutdown_and_wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_noop_worker_acks_everything() {
        let store = MemoryStore::new().into_store();
        let job_id = Uuid::now_v7();
        store
            .tasks
            .enqueue(job_id, &["https://a.test".to_string(), "https://b.test".to_string()])
            .await
            .unwrap();

        let worker = WorkerBuilder::new(store.tasks.clone())
            .with_config(WorkerConfig::default().with_poll_interval(10))
            .with_handler(NoOpHandler)
            .build()
            .unwrap();
        let handle = worker.start();

        for _ in 0..200 {
            if store.tasks.pending_count().await.unwrap() == 0 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.tasks.pending_count().await.unwrap(), 0);

        let mut events = handle.events();
        handle.shutdown_and_wait().await.unwrap();
        let mut saw_stop = false;
        while let Ok(event) = events.try_recv() {
            saw_stop |= event == WorkerEvent::WorkerStopped;
        }
        assert!(saw_stop);
    }
}
