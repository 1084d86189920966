//! Domain models for the scrape pipeline.
//!
//! JSON representations use camelCase field names, matching the HTTP surface.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::error::Error;

// =============================================================================
// STATUS ENUMS
// =============================================================================

/// Lifecycle status of a scrape job.
///
/// A job's status is a pure function of its counters, see [`JobStatus::derive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    /// Derive the job status from its counters.
    ///
    /// - no outcome recorded yet: `queued`
    /// - some outcomes outstanding: `processing`
    /// - all outcomes recorded: `failed` if any target failed, else `done`
    pub fn derive(total: i32, done: i32, failed: i32) -> Self {
        let finished = done + failed;
        if finished == 0 && total > 0 {
            JobStatus::Queued
        } else if finished < total {
            JobStatus::Processing
        } else if failed > 0 {
            JobStatus::Failed
        } else {
            JobStatus::Done
        }
    }

    /// Terminal statuses never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(Error::Internal(format!("unknown job status: {other}"))),
        }
    }
}

/// Lifecycle status of a single target: `queued -> processing -> {done, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl TargetStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TargetStatus::Done | TargetStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Queued => "queued",
            TargetStatus::Processing => "processing",
            TargetStatus::Done => "done",
            TargetStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TargetStatus::Queued),
            "processing" => Ok(TargetStatus::Processing),
            "done" => Ok(TargetStatus::Done),
            "failed" => Ok(TargetStatus::Failed),
            other => Err(Error::Internal(format!("unknown target status: {other}"))),
        }
    }
}

/// Kind of media reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            other => Err(Error::InvalidInput(format!("unknown media type: {other}"))),
        }
    }
}

/// Media type filter accepted by queries: `all`, `image` or `video`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaTypeFilter {
    #[default]
    All,
    Image,
    Video,
}

impl MediaTypeFilter {
    /// The concrete type to filter on, `None` for `all`.
    pub fn media_type(&self) -> Option<MediaType> {
        match self {
            MediaTypeFilter::All => None,
            MediaTypeFilter::Image => Some(MediaType::Image),
            MediaTypeFilter::Video => Some(MediaType::Video),
        }
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// One scrape submission. Counters only ever increase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub total_targets: i32,
    pub done_targets: i32,
    pub failed_targets: i32,
}

impl ScrapeJob {
    /// Number of targets with a recorded outcome.
    pub fn finished_targets(&self) -> i32 {
        self.done_targets + self.failed_targets
    }
}

/// One URL to be fetched and processed within a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeTarget {
    pub id: Uuid,
    pub job_id: Uuid,
    pub source_url: String,
    pub status: TargetStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored, deduplicated media reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: Uuid,
    pub job_id: Uuid,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub source_url: String,
    pub media_url: String,
    pub created_at: DateTime<Utc>,
}

impl MediaItem {
    /// Position of this item in feed order.
    pub fn cursor(&self) -> MediaCursor {
        MediaCursor {
            created_at: self.created_at,
            id: self.id,
        }
    }
}

/// A media reference produced by the extractor for one page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMedia {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub media_url: String,
}

impl ExtractedMedia {
    pub fn new(media_type: MediaType, media_url: impl Into<String>) -> Self {
        Self {
            media_type,
            media_url: media_url.into(),
        }
    }
}

/// A unit of work on the task queue: process `url` for `job_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeTask {
    pub id: Uuid,
    pub job_id: Uuid,
    pub url: String,
    /// Number of times this task has been claimed, including the current claim.
    pub attempts: i32,
}

// =============================================================================
// QUERIES
// =============================================================================

/// Filter shared by media listing and the media feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaFilter {
    pub job_id: Option<Uuid>,
    pub media_type: Option<MediaType>,
    /// Free-text search, see [`crate::search`].
    pub search: Option<String>,
}

impl MediaFilter {
    pub fn with_job(mut self, job_id: Uuid) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = if search.trim().is_empty() {
            None
        } else {
            Some(search)
        };
        self
    }
}

/// Feed position: items strictly after `(created_at, id)` are new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MediaCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

/// Validated media listing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaQuery {
    pub filter: MediaFilter,
    /// 1-based page number.
    pub page: i64,
    pub limit: i64,
}

impl Default for MediaQuery {
    fn default() -> Self {
        Self {
            filter: MediaFilter::default(),
            page: 1,
            limit: defaults::PAGE_LIMIT,
        }
    }
}

impl MediaQuery {
    /// Build a query, rejecting `page < 1` and `limit` outside `1..=100`.
    pub fn new(filter: MediaFilter, page: i64, limit: i64) -> crate::Result<Self> {
        if page < 1 {
            return Err(Error::InvalidInput("page must be >= 1".to_string()));
        }
        if !(1..=defaults::PAGE_LIMIT_MAX).contains(&limit) {
            return Err(Error::InvalidInput(format!(
                "limit must be between 1 and {}",
                defaults::PAGE_LIMIT_MAX
            )));
        }
        Ok(Self {
            filter,
            page,
            limit,
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// One page of media, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaPage {
    pub items: Vec<MediaItem>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl MediaPage {
    pub fn new(items: Vec<MediaItem>, query: &MediaQuery, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + query.limit - 1) / query.limit
        };
        Self {
            items,
            page: query.page,
            limit: query.limit,
            total,
            total_pages,
        }
    }
}

/// Result of a job submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub accepted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_derive_queued_before_any_outcome() {
        assert_eq!(JobStatus::derive(3, 0, 0), JobStatus::Queued);
    }

    #[test]
    fn test_job_status_derive_processing_while_outstanding() {
        assert_eq!(JobStatus::derive(3, 1, 0), JobStatus::Processing);
        assert_eq!(JobStatus::derive(3, 0, 1), JobStatus::Processing);
        assert_eq!(JobStatus::derive(3, 1, 1), JobStatus::Processing);
    }

    #[test]
    fn test_job_status_derive_terminal() {
        assert_eq!(JobStatus::derive(3, 3, 0), JobStatus::Done);
        assert_eq!(JobStatus::derive(3, 2, 1), JobStatus::Failed);
        assert_eq!(JobStatus::derive(1, 0, 1), JobStatus::Failed);
    }

    #[test]
    fn test_job_status_terminal_flags() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Done,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        for status in [
            TargetStatus::Queued,
            TargetStatus::Processing,
            TargetStatus::Done,
            TargetStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<TargetStatus>().unwrap(), status);
        }
        assert!("running".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_media_type_filter() {
        assert_eq!(MediaTypeFilter::All.media_type(), None);
        assert_eq!(MediaTypeFilter::Image.media_type(), Some(MediaType::Image));
        assert_eq!(MediaTypeFilter::Video.media_type(), Some(MediaType::Video));
        let parsed: MediaTypeFilter = serde_json::from_str("\"video\"").unwrap();
        assert_eq!(parsed, MediaTypeFilter::Video);
        assert!(serde_json::from_str::<MediaTypeFilter>("\"audio\"").is_err());
    }

    #[test]
    fn test_job_serializes_camel_case() {
        let job = ScrapeJob {
            id: Uuid::nil(),
            status: JobStatus::Processing,
            created_at: Utc::now(),
            total_targets: 3,
            done_targets: 1,
            failed_targets: 0,
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "processing");
        assert_eq!(json["totalTargets"], 3);
        assert_eq!(json["doneTargets"], 1);
        assert_eq!(json["failedTargets"], 0);
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_media_item_serializes_type_field() {
        let item = MediaItem {
            id: Uuid::nil(),
            job_id: Uuid::nil(),
            media_type: MediaType::Video,
            source_url: "https://x.test/p".to_string(),
            media_url: "https://x.test/v.mp4".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "video");
        assert_eq!(json["sourceUrl"], "https://x.test/p");
        assert_eq!(json["mediaUrl"], "https://x.test/v.mp4");
    }

    #[test]
    fn test_media_query_validation() {
        assert!(MediaQuery::new(MediaFilter::default(), 0, 24).is_err());
        assert!(MediaQuery::new(MediaFilter::default(), 1, 0).is_err());
        assert!(MediaQuery::new(MediaFilter::default(), 1, 101).is_err());
        let q = MediaQuery::new(MediaFilter::default(), 3, 10).unwrap();
        assert_eq!(q.offset(), 20);
    }

    #[test]
    fn test_media_page_total_pages() {
        let q = MediaQuery::new(MediaFilter::default(), 1, 24).unwrap();
        assert_eq!(MediaPage::new(vec![], &q, 0).total_pages, 0);
        assert_eq!(MediaPage::new(vec![], &q, 24).total_pages, 1);
        assert_eq!(MediaPage::new(vec![], &q, 25).total_pages, 2);
    }

    #[test]
    fn test_media_filter_blank_search_is_none() {
        let f = MediaFilter::default().with_search("   ");
        assert_eq!(f.search, None);
        let f = MediaFilter::default().with_search("cats");
        assert_eq!(f.search.as_deref(), Some("cats"));
    }

    #[test]
    fn test_media_cursor_ordering() {
        let t = Utc::now();
        let a = MediaCursor {
            created_at: t,
            id: Uuid::from_u128(1),
        };
        let b = MediaCursor {
            created_at: t,
            id: Uuid::from_u128(2),
        };
        let c = MediaCursor {
            created_at: t + chrono::Duration::milliseconds(1),
            id: Uuid::from_u128(0),
        };
        assert!(a < b);
        assert!(b < c);
    }
}
