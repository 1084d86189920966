//! Push notifications over Server-Sent Events.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::BroadcastStream;

use mediascrape_core::{defaults, EventEnvelope};

use super::sse_json;
use crate::AppState;

/// SSE event stream of pipeline events.
///
/// Each message is named after the namespaced event type (`job.queued`,
/// `target.completed`, ...) and carries the full envelope. Subscribers that
/// fall behind skip the events they missed.
#[utoipa::path(get, path = "/api/events", tag = "Events",
    responses((status = 200, description = "text/event-stream of pipeline events")))]
pub async fn sse_events(
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_bus.subscribe();

    use tokio_stream::StreamExt as _;
    let stream = BroadcastStream::new(rx).filter_map(|result: Result<EventEnvelope, _>| {
        match result {
            Ok(envelope) => Some(Ok(sse_json(&envelope.event_type, &envelope))),
            Err(_) => None, // Skip lagged/closed errors
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(defaults::SSE_KEEPALIVE_SECS))
            .text("keepalive"),
    )
}
