//! In-memory implementation of every storage trait.
//!
//! Mirrors the PostgreSQL semantics: serialized counter updates, monotonic
//! target transitions, `(source_url, media_url, type)` deduplication,
//! strictly increasing media timestamps and lease-based task redelivery.
//! Used by the test suites and selectable with `STORAGE_BACKEND=memory`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use mediascrape_core::{
    defaults, matches_search, search_groups, Error, ExtractedMedia, JobRepository, JobStatus,
    MediaCursor, MediaFilter, MediaItem, MediaPage, MediaQuery, MediaRepository, MediaType,
    Result, ScrapeJob, ScrapeTarget, ScrapeTask, Store, TargetClaim, TargetOutcome,
    TargetRepository, TargetStatus, TaskQueue,
};

struct LeasedTask {
    task: ScrapeTask,
    visible_at: Instant,
}

#[derive(Default)]
struct State {
    jobs: HashMap<Uuid, ScrapeJob>,
    targets: HashMap<(Uuid, String), ScrapeTarget>,
    /// Insertion order equals `(created_at, id)` order.
    media: Vec<MediaItem>,
    media_keys: HashSet<(String, String, MediaType)>,
    tasks: VecDeque<LeasedTask>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl State {
    /// Wall-clock time, bumped by 1µs when it would not advance.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }
}

/// Mutex-protected in-memory store.
pub struct MemoryStore {
    state: Mutex<State>,
    lease: Duration,
    notify: Arc<Notify>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            lease: Duration::from_secs(defaults::TASK_LEASE_SECS),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Wrap into a [`Store`] bundle.
    pub fn into_store(self) -> Store {
        Store::from_backend(Arc::new(self))
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))
    }

    fn filter_matches(filter: &MediaFilter, groups: &[Vec<String>], item: &MediaItem) -> bool {
        filter.job_id.map_or(true, |id| item.job_id == id)
            && filter.media_type.map_or(true, |t| item.media_type == t)
            && matches_search(groups, &item.source_url, &item.media_url)
    }
}

#[async_trait]
impl JobRepository for MemoryStore {
    async fn create_with_targets(&self, urls: &[String]) -> Result<ScrapeJob> {
        if urls.is_empty() {
            return Err(Error::InvalidInput("No valid urls".to_string()));
        }
        let mut state = self.lock()?;
        let created_at = state.next_timestamp();
        let job = ScrapeJob {
            id: Uuid::now_v7(),
            status: JobStatus::Queued,
            created_at,
            total_targets: urls.len() as i32,
            done_targets: 0,
            failed_targets: 0,
        };
        for url in urls {
            let ts = state.next_timestamp();
            state.targets.insert(
                (job.id, url.clone()),
                ScrapeTarget {
                    id: Uuid::now_v7(),
                    job_id: job.id,
                    source_url: url.clone(),
                    status: TargetStatus::Queued,
                    error: None,
                    created_at: ts,
                    updated_at: ts,
                },
            );
        }
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<ScrapeJob>> {
        Ok(self.lock()?.jobs.get(&job_id).cloned())
    }

    async fn record_outcome(&self, job_id: Uuid, ok: bool) -> Result<ScrapeJob> {
        let mut state = self.lock()?;
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or(Error::JobNotFound(job_id))?;

        if job.finished_targets() < job.total_targets {
            if ok {
                job.done_targets += 1;
            } else {
                job.failed_targets += 1;
            }
            job.status = JobStatus::derive(job.total_targets, job.done_targets, job.failed_targets);
        }
        Ok(job.clone())
    }

    async fn delete(&self, job_id: Uuid) -> Result<bool> {
        let mut state = self.lock()?;
        if state.jobs.remove(&job_id).is_none() {
            return Ok(false);
        }
        state.targets.retain(|(id, _), _| *id != job_id);
        let State {
            media, media_keys, ..
        } = &mut *state;
        media.retain(|m| {
            let keep = m.job_id != job_id;
            if !keep {
                media_keys.remove(&(m.source_url.clone(), m.media_url.clone(), m.media_type));
            }
            keep
        });
        Ok(true)
    }

    async fn clear_all(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.media.clear();
        state.media_keys.clear();
        state.targets.clear();
        state.jobs.clear();
        Ok(())
    }
}

#[async_trait]
impl TargetRepository for MemoryStore {
    async fn begin(&self, job_id: Uuid, source_url: &str) -> Result<TargetClaim> {
        let mut state = self.lock()?;
        let now = state.next_timestamp();
        let Some(target) = state.targets.get_mut(&(job_id, source_url.to_string())) else {
            return Ok(TargetClaim::NotFound);
        };
        if target.status.is_terminal() {
            return Ok(TargetClaim::AlreadyFinished);
        }
        target.status = TargetStatus::Processing;
        target.updated_at = now;
        Ok(TargetClaim::Started)
    }

    async fn finish(
        &self,
        job_id: Uuid,
        source_url: &str,
        outcome: &TargetOutcome,
    ) -> Result<bool> {
        let mut state = self.lock()?;
        let now = state.next_timestamp();
        match state.targets.get_mut(&(job_id, source_url.to_string())) {
            Some(target) if !target.status.is_terminal() => {
                target.status = outcome.status();
                target.error = outcome.error().map(str::to_string);
                target.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<ScrapeTarget>> {
        let state = self.lock()?;
        let mut targets: Vec<ScrapeTarget> = state
            .targets
            .values()
            .filter(|t| t.job_id == job_id)
            .cloned()
            .collect();
        targets.sort_by_key(|t| (t.created_at, t.id));
        Ok(targets)
    }
}

#[async_trait]
impl MediaRepository for MemoryStore {
    async fn insert_if_absent(
        &self,
        job_id: Uuid,
        source_url: &str,
        items: &[ExtractedMedia],
    ) -> Result<u64> {
        let mut state = self.lock()?;
        let mut inserted = 0;
        for item in items {
            let key = (
                source_url.to_string(),
                item.media_url.clone(),
                item.media_type,
            );
            if !state.media_keys.insert(key) {
                continue;
            }
            let created_at = state.next_timestamp();
            state.media.push(MediaItem {
                id: Uuid::now_v7(),
                job_id,
                media_type: item.media_type,
                source_url: source_url.to_string(),
                media_url: item.media_url.clone(),
                created_at,
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn list(&self, query: &MediaQuery) -> Result<MediaPage> {
        let state = self.lock()?;
        let groups = query
            .filter
            .search
            .as_deref()
            .map(search_groups)
            .unwrap_or_default();

        let matching: Vec<&MediaItem> = state
            .media
            .iter()
            .rev()
            .filter(|m| Self::filter_matches(&query.filter, &groups, m))
            .collect();
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok(MediaPage::new(items, query, total))
    }

    async fn list_after(
        &self,
        filter: &MediaFilter,
        after: Option<MediaCursor>,
        limit: i64,
    ) -> Result<Vec<MediaItem>> {
        let state = self.lock()?;
        let groups = filter
            .search
            .as_deref()
            .map(search_groups)
            .unwrap_or_default();

        Ok(state
            .media
            .iter()
            .filter(|m| after.map_or(true, |c| m.cursor() > c))
            .filter(|m| Self::filter_matches(filter, &groups, m))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TaskQueue for MemoryStore {
    async fn enqueue(&self, job_id: Uuid, urls: &[String]) -> Result<usize> {
        {
            let mut state = self.lock()?;
            let now = Instant::now();
            for url in urls {
                state.tasks.push_back(LeasedTask {
                    task: ScrapeTask {
                        id: Uuid::now_v7(),
                        job_id,
                        url: url.clone(),
                        attempts: 0,
                    },
                    visible_at: now,
                });
            }
        }
        self.notify.notify_waiters();
        Ok(urls.len())
    }

    async fn claim(&self) -> Result<Option<ScrapeTask>> {
        let mut state = self.lock()?;
        let now = Instant::now();
        let lease = self.lease;
        let claimed = state
            .tasks
            .iter_mut()
            .filter(|t| t.visible_at <= now)
            .min_by_key(|t| t.visible_at)
            .map(|entry| {
                entry.visible_at = now + lease;
                entry.task.attempts += 1;
                entry.task.clone()
            });
        Ok(claimed)
    }

    async fn ack(&self, task_id: Uuid) -> Result<()> {
        self.lock()?.tasks.retain(|t| t.task.id != task_id);
        Ok(())
    }

    async fn pending_count(&self) -> Result<i64> {
        Ok(self.lock()?.tasks.len() as i64)
    }

    fn notifier(&self) -> Arc<Notify> {
        self.notify.clone()
    }
}
