//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

/// Error returned by handlers. Rendered as `{"error": "<message>"}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound,
    Internal(String),
}

impl ApiError {
    pub fn invalid_body() -> Self {
        ApiError::BadRequest("Invalid body".to_string())
    }

    pub fn invalid_query() -> Self {
        ApiError::BadRequest("Invalid query".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) | ApiError::Internal(msg) => msg,
            ApiError::NotFound => "Not found",
        }
    }
}

impl From<mediascrape_core::Error> for ApiError {
    fn from(err: mediascrape_core::Error) -> Self {
        use mediascrape_core::Error;
        match err {
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::NotFound(_) | Error::JobNotFound(_) => ApiError::NotFound,
            other => {
                error!(subsystem = "api", error = %other, "Request failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.message(),
        }));
        (self.status(), body).into_response()
    }
}
