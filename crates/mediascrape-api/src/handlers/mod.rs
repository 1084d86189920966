//! HTTP handlers.

pub mod events;
pub mod jobs;
pub mod media;
pub mod scrape;
pub mod system;

use axum::response::sse::Event;
use serde::Serialize;

/// Named SSE event with a JSON payload.
pub(crate) fn sse_json<T: Serialize>(name: &str, data: &T) -> Event {
    let json = serde_json::to_string(data)
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string());
    Event::default().event(name).data(json)
}

/// `event: error` with `{"error": msg}`.
pub(crate) fn sse_error(msg: &str) -> Event {
    sse_json("error", &serde_json::json!({ "error": msg }))
}
