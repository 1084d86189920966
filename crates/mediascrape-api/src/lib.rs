//! # mediascrape-api
//!
//! HTTP surface of the scrape pipeline: job submission, status, media
//! listing, Server-Sent Event streams, and the worker-to-event-bus bridge.

pub mod bridge;
pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use uuid::Uuid;

use mediascrape_core::EventBus;
use mediascrape_jobs::JobOrchestrator;

pub use bridge::spawn_event_bridge;
pub use config::{AllowedOrigins, ServerConfig, StorageBackend};
pub use error::ApiError;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: JobOrchestrator,
    /// Event bus behind `/api/events`.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    pub fn new(orchestrator: JobOrchestrator, event_bus: Arc<EventBus>) -> Self {
        Self {
            orchestrator,
            event_bus,
        }
    }
}

// =============================================================================
// OPENAPI
// =============================================================================

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Media Scraper API",
        description = "Scrape image and video references from web pages"
    ),
    paths(
        handlers::scrape::submit_scrape,
        handlers::jobs::get_job,
        handlers::jobs::list_job_targets,
        handlers::jobs::stream_job,
        handlers::media::list_media,
        handlers::media::stream_media,
        handlers::media::clear_media,
        handlers::events::sse_events,
        handlers::system::health_check,
    ),
    components(schemas(
        handlers::scrape::ScrapeRequest,
        mediascrape_core::SubmitResponse,
        mediascrape_core::ScrapeJob,
        mediascrape_core::ScrapeTarget,
        mediascrape_core::MediaItem,
        mediascrape_core::MediaPage,
        mediascrape_core::JobStatus,
        mediascrape_core::TargetStatus,
        mediascrape_core::MediaType,
        mediascrape_core::MediaTypeFilter,
    )),
    tags(
        (name = "Scrape", description = "Job submission"),
        (name = "Jobs", description = "Job status and progress"),
        (name = "Media", description = "Extracted media"),
        (name = "Events", description = "Push notifications"),
        (name = "System", description = "Health checks and API description")
    )
)]
pub struct ApiDoc;

// =============================================================================
// ROUTER
// =============================================================================

/// Build the application router with its middleware stack.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(config.allowed_origins.to_allow_origin())
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::system::health_check))
        .route("/openapi.json", get(handlers::system::openapi_json))
        .route("/api/scrape", post(handlers::scrape::submit_scrape))
        .route("/api/jobs/:id", get(handlers::jobs::get_job))
        .route("/api/jobs/:id/targets", get(handlers::jobs::list_job_targets))
        .route("/api/jobs/:id/stream", get(handlers::jobs::stream_job))
        .route(
            "/api/media",
            get(handlers::media::list_media).delete(handlers::media::clear_media),
        )
        .route("/api/media/stream", get(handlers::media::stream_media))
        .route("/api/events", get(handlers::events::sse_events))
        // Applied as its own (innermost) layer so its response body is
        // converted back to `Body`, which `CorsLayer` requires to be `Default`.
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors),
        )
        .with_state(state)
}
