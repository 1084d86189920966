//! Health and API description.

use axum::response::IntoResponse;
use axum::Json;
use utoipa::OpenApi;

use crate::ApiDoc;

#[utoipa::path(get, path = "/health", tag = "System",
    responses((status = 200, description = "Service is up")))]
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// OpenAPI document for this server.
pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
