//! Job submission.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::debug;
use utoipa::ToSchema;

use mediascrape_core::SubmitResponse;

use crate::error::ApiError;
use crate::AppState;

/// Body of `POST /api/scrape`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScrapeRequest {
    /// Raw URLs; scheme-less entries are treated as https.
    pub urls: Vec<String>,
}

impl ScrapeRequest {
    fn is_valid(&self) -> bool {
        !self.urls.is_empty() && self.urls.iter().all(|u| !u.is_empty())
    }
}

/// Create a scrape job for a list of URLs.
#[utoipa::path(post, path = "/api/scrape", tag = "Scrape",
    request_body = ScrapeRequest,
    responses(
        (status = 200, description = "Job created", body = SubmitResponse),
        (status = 400, description = "Invalid body or no valid urls")
    ))]
pub async fn submit_scrape(
    State(state): State<AppState>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(req) = body.map_err(|e| {
        debug!(subsystem = "api", error = %e, "Rejected scrape body");
        ApiError::invalid_body()
    })?;
    if !req.is_valid() {
        return Err(ApiError::invalid_body());
    }

    let resp = state.orchestrator.submit(&req.urls).await?;
    Ok(Json(resp))
}
