//! Polling feeds for job progress and newly stored media.
//!
//! Each watcher runs its own task and reports through a bounded channel. A
//! watcher stops as soon as its receiver is dropped, so closing a client
//! connection never leaves a polling loop behind. Jobs are not affected.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use mediascrape_core::env::env_clamped;
use mediascrape_core::{
    defaults, MediaCursor, MediaFilter, MediaItem, MediaRepository, Result, ScrapeJob, Store,
};

/// Feed settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Delay between polls; the first poll runs immediately.
    pub interval: Duration,
    /// Maximum media items delivered per poll.
    pub media_batch: i64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(defaults::STREAM_INTERVAL_MS),
            media_batch: defaults::MEDIA_STREAM_BATCH,
        }
    }
}

impl FeedConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default | Bounds |
    /// |----------|---------|--------|
    /// | `STREAM_INTERVAL_MS` | `1000` | >= 50 |
    /// | `MEDIA_STREAM_BATCH` | `200` | 1..=1000 |
    pub fn from_env() -> Self {
        let interval_ms = env_clamped(
            "STREAM_INTERVAL_MS",
            defaults::STREAM_INTERVAL_MS,
            50,
            u64::MAX,
        );
        Self {
            interval: Duration::from_millis(interval_ms),
            media_batch: env_clamped("MEDIA_STREAM_BATCH", defaults::MEDIA_STREAM_BATCH, 1, 1000),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_media_batch(mut self, batch: i64) -> Self {
        self.media_batch = batch;
        self
    }
}

// =============================================================================
// JOB PROGRESS
// =============================================================================

/// One message of a job progress feed.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Current snapshot. The feed ends after a terminal snapshot.
    Progress(ScrapeJob),
    /// The job does not exist (anymore). Always the last message.
    NotFound,
    /// Store failure. Always the last message.
    Error(String),
}

impl ProgressEvent {
    /// Whether the feed ends after this message.
    pub fn is_final(&self) -> bool {
        match self {
            ProgressEvent::Progress(job) => job.status.is_terminal(),
            ProgressEvent::NotFound | ProgressEvent::Error(_) => true,
        }
    }
}

/// Poll the job once.
pub async fn poll_progress(store: &Store, job_id: Uuid) -> ProgressEvent {
    match store.jobs.get(job_id).await {
        Ok(Some(job)) => ProgressEvent::Progress(job),
        Ok(None) => ProgressEvent::NotFound,
        Err(e) => ProgressEvent::Error(e.to_string()),
    }
}

/// Spawn a progress watcher for `job_id`.
pub fn watch_progress(store: Store, job_id: Uuid, config: FeedConfig) -> mpsc::Receiver<ProgressEvent> {
    let (tx, rx) = mpsc::channel(defaults::FEED_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut ticker = interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tx.closed() => {
                    debug!(subsystem = "feed", job_id = %job_id, "Progress watcher disconnected");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let event = poll_progress(&store, job_id).await;
            if let ProgressEvent::Error(msg) = &event {
                warn!(subsystem = "feed", job_id = %job_id, error = %msg, "Progress poll failed");
            }
            let last = event.is_final();
            if tx.send(event).await.is_err() || last {
                break;
            }
        }
    });

    rx
}

// =============================================================================
// MEDIA
// =============================================================================

/// One message of a media feed.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaFeedEvent {
    /// Items stored since the previous batch, oldest first.
    Media(Vec<MediaItem>),
    /// Nothing new since the previous poll.
    Ping,
    /// Store failure. Always the last message.
    Error(String),
}

/// Cursor state of one media watcher.
///
/// Each poll returns the items strictly after the last delivered
/// `(created_at, id)`, so no item is delivered twice or skipped.
#[derive(Debug, Clone)]
pub struct MediaFeed {
    filter: MediaFilter,
    cursor: Option<MediaCursor>,
    batch: i64,
}

impl MediaFeed {
    pub fn new(filter: MediaFilter, batch: i64) -> Self {
        Self {
            filter,
            cursor: None,
            batch,
        }
    }

    pub fn cursor(&self) -> Option<&MediaCursor> {
        self.cursor.as_ref()
    }

    /// Fetch the next batch and advance the cursor past it.
    pub async fn poll(&mut self, media: &dyn MediaRepository) -> Result<MediaFeedEvent> {
        let items = media
            .list_after(&self.filter, self.cursor, self.batch)
            .await?;

        match items.last() {
            Some(last) => {
                self.cursor = Some(last.cursor());
                Ok(MediaFeedEvent::Media(items))
            }
            None => Ok(MediaFeedEvent::Ping),
        }
    }
}

/// Spawn a media watcher for `filter`.
pub fn watch_media(store: Store, filter: MediaFilter, config: FeedConfig) -> mpsc::Receiver<MediaFeedEvent> {
    let (tx, rx) = mpsc::channel(defaults::FEED_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut feed = MediaFeed::new(filter, config.media_batch);
        let mut ticker = interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tx.closed() => {
                    debug!(subsystem = "feed", "Media watcher disconnected");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let (event, last) = match feed.poll(store.media.as_ref()).await {
                Ok(event) => (event, false),
                Err(e) => {
                    warn!(subsystem = "feed", error = %e, "Media poll failed");
                    (MediaFeedEvent::Error(e.to_string()), true)
                }
            };
            if tx.send(event).await.is_err() || last {
                break;
            }
        }
    });

    rx
}
