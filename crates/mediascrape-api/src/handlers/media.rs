//! Media listing, the media stream and clear-all.

use std::convert::Infallible;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::stream::{BoxStream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use utoipa::IntoParams;
use uuid::Uuid;

use mediascrape_core::{defaults, MediaFilter, MediaPage, MediaQuery, MediaTypeFilter};
use mediascrape_jobs::MediaFeedEvent;

use super::{sse_error, sse_json};
use crate::error::ApiError;
use crate::AppState;

/// Query of `GET /api/media`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MediaListParams {
    /// Page number, starting at 1.
    pub page: Option<i64>,
    /// Items per page, 1..=100.
    pub limit: Option<i64>,
    #[serde(rename = "type")]
    pub media_type: Option<MediaTypeFilter>,
    /// Whitespace separated terms matched against source and media URLs.
    pub search: Option<String>,
}

impl MediaListParams {
    fn into_query(self) -> Result<MediaQuery, ApiError> {
        let filter = filter(None, self.media_type, self.search);
        MediaQuery::new(
            filter,
            self.page.unwrap_or(1),
            self.limit.unwrap_or(defaults::PAGE_LIMIT),
        )
        .map_err(|_| ApiError::invalid_query())
    }
}

/// Query of `GET /api/media/stream`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MediaStreamParams {
    /// Only media of this job.
    #[serde(rename = "jobId")]
    pub job_id: Option<String>,
    #[serde(rename = "type")]
    pub media_type: Option<MediaTypeFilter>,
    pub search: Option<String>,
}

impl MediaStreamParams {
    fn into_filter(self) -> Result<MediaFilter, ApiError> {
        let job_id = match self.job_id {
            Some(raw) => Some(Uuid::parse_str(&raw).map_err(|_| ApiError::invalid_query())?),
            None => None,
        };
        Ok(filter(job_id, self.media_type, self.search))
    }
}

fn filter(job_id: Option<Uuid>, media_type: Option<MediaTypeFilter>, search: Option<String>) -> MediaFilter {
    let mut filter = MediaFilter::default();
    if let Some(job_id) = job_id {
        filter = filter.with_job(job_id);
    }
    if let Some(media_type) = media_type.and_then(|t| t.media_type()) {
        filter = filter.with_type(media_type);
    }
    if let Some(search) = search {
        filter = filter.with_search(search);
    }
    filter
}

/// List stored media, newest first.
#[utoipa::path(get, path = "/api/media", tag = "Media",
    params(MediaListParams),
    responses(
        (status = 200, description = "One page of media", body = MediaPage),
        (status = 400, description = "Invalid query")
    ))]
pub async fn list_media(
    State(state): State<AppState>,
    params: Result<Query<MediaListParams>, QueryRejection>,
) -> Result<Json<MediaPage>, ApiError> {
    let Query(params) = params.map_err(|_| ApiError::invalid_query())?;
    let query = params.into_query()?;
    Ok(Json(state.orchestrator.list_media(&query).await?))
}

/// Stream newly stored media as Server-Sent Events.
///
/// `event: media` carries a JSON array of new items, `event: ping` is sent
/// when nothing new arrived since the last poll.
#[utoipa::path(get, path = "/api/media/stream", tag = "Media",
    params(MediaStreamParams),
    responses(
        (status = 200, description = "text/event-stream of media batches"),
        (status = 400, description = "Invalid query")
    ))]
pub async fn stream_media(
    State(state): State<AppState>,
    params: Result<Query<MediaStreamParams>, QueryRejection>,
) -> Result<Sse<BoxStream<'static, Result<Event, Infallible>>>, ApiError> {
    let Query(params) = params.map_err(|_| ApiError::invalid_query())?;
    let filter = params.into_filter()?;

    let stream = ReceiverStream::new(state.orchestrator.watch_media(filter))
        .map(|event| {
            Ok(match event {
                MediaFeedEvent::Media(items) => sse_json("media", &items),
                MediaFeedEvent::Ping => Event::default().event("ping").data("{}"),
                MediaFeedEvent::Error(msg) => sse_error(&msg),
            })
        })
        .boxed();
    Ok(Sse::new(stream))
}

/// Delete every job, target and media item.
#[utoipa::path(delete, path = "/api/media", tag = "Media",
    responses((status = 200, description = "Everything deleted")))]
pub async fn clear_media(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state.orchestrator.clear_all().await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
