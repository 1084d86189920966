//! Job status, targets and the progress stream.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::stream::{self, BoxStream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use mediascrape_core::{ScrapeJob, ScrapeTarget};
use mediascrape_jobs::ProgressEvent;

use super::{sse_error, sse_json};
use crate::error::ApiError;
use crate::AppState;

/// Malformed ids cannot name a job, so they are reported as not found.
fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

/// Get a job snapshot.
#[utoipa::path(get, path = "/api/jobs/{id}", tag = "Jobs",
    params(("id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job snapshot", body = ScrapeJob),
        (status = 404, description = "Not found")
    ))]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScrapeJob>, ApiError> {
    let job_id = parse_job_id(&id)?;
    Ok(Json(state.orchestrator.status(job_id).await?))
}

/// List the targets of a job.
#[utoipa::path(get, path = "/api/jobs/{id}/targets", tag = "Jobs",
    params(("id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Targets in creation order", body = Vec<ScrapeTarget>),
        (status = 404, description = "Not found")
    ))]
pub async fn list_job_targets(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ScrapeTarget>>, ApiError> {
    let job_id = parse_job_id(&id)?;
    Ok(Json(state.orchestrator.targets(job_id).await?))
}

/// Stream job progress as Server-Sent Events.
///
/// `event: progress` carries the job snapshot, the first one immediately.
/// The stream ends after a terminal snapshot or after an `event: error`.
#[utoipa::path(get, path = "/api/jobs/{id}/stream", tag = "Jobs",
    params(("id" = String, Path, description = "Job id")),
    responses((status = 200, description = "text/event-stream of progress events")))]
pub async fn stream_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<BoxStream<'static, Result<Event, Infallible>>> {
    let stream = match Uuid::parse_str(&id) {
        Ok(job_id) => ReceiverStream::new(state.orchestrator.watch_progress(job_id))
            .map(|event| Ok(progress_event(event)))
            .boxed(),
        Err(_) => stream::once(async { Ok(sse_error("Not found")) }).boxed(),
    };
    Sse::new(stream)
}

fn progress_event(event: ProgressEvent) -> Event {
    match event {
        ProgressEvent::Progress(job) => sse_json("progress", &job),
        ProgressEvent::NotFound => sse_error("Not found"),
        ProgressEvent::Error(msg) => sse_error(&msg),
    }
}
