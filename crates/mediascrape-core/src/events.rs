//! Server event types, envelope schema, and event bus for push notifications.
//!
//! The worker pool and the orchestrator publish [`ServerEvent`]s on a single
//! broadcast channel. Downstream consumers (the SSE endpoint, logging) each
//! subscribe independently. Every emission is wrapped in an
//! [`EventEnvelope`] carrying a UUIDv7 id, a timestamp and the namespaced
//! event type.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::JobStatus;

// ============================================================================
// Event Envelope
// ============================================================================

/// Versioned wrapper around a domain event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// UUIDv7, time-ordered.
    pub event_id: Uuid,
    /// Namespaced type, e.g. `"target.completed"`.
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    /// Job this event relates to.
    pub job_id: Uuid,
    /// Payload schema version.
    pub payload_version: u32,
    pub payload: ServerEvent,
}

impl EventEnvelope {
    pub fn new(event: ServerEvent) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event.namespaced_event_type().to_string(),
            occurred_at: Utc::now(),
            job_id: event.job_id(),
            payload_version: 1,
            payload: event,
        }
    }
}

// ============================================================================
// Server Event (domain payloads)
// ============================================================================

/// Pipeline event, serialized with a `type` tag:
/// `{"type":"TargetCompleted","jobId":"...","sourceUrl":"...",...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// A job was created and its tasks enqueued.
    JobQueued { job_id: Uuid, total_targets: i32 },
    /// A worker started processing a target.
    TargetStarted { job_id: Uuid, source_url: String },
    /// A target was fetched and its media persisted.
    TargetCompleted {
        job_id: Uuid,
        source_url: String,
        media_found: usize,
        inserted: u64,
    },
    /// A target failed to fetch.
    TargetFailed {
        job_id: Uuid,
        source_url: String,
        error: String,
    },
    /// Every target of a job has an outcome.
    JobFinished {
        job_id: Uuid,
        status: JobStatus,
        done_targets: i32,
        failed_targets: i32,
    },
}

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::JobQueued { .. } => "JobQueued",
            ServerEvent::TargetStarted { .. } => "TargetStarted",
            ServerEvent::TargetCompleted { .. } => "TargetCompleted",
            ServerEvent::TargetFailed { .. } => "TargetFailed",
            ServerEvent::JobFinished { .. } => "JobFinished",
        }
    }

    /// Namespaced event type used in the envelope and as the SSE event name.
    pub fn namespaced_event_type(&self) -> &'static str {
        match self {
            ServerEvent::JobQueued { .. } => "job.queued",
            ServerEvent::TargetStarted { .. } => "target.started",
            ServerEvent::TargetCompleted { .. } => "target.completed",
            ServerEvent::TargetFailed { .. } => "target.failed",
            ServerEvent::JobFinished { .. } => "job.finished",
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            ServerEvent::JobQueued { job_id, .. }
            | ServerEvent::TargetStarted { job_id, .. }
            | ServerEvent::TargetCompleted { job_id, .. }
            | ServerEvent::TargetFailed { job_id, .. }
            | ServerEvent::JobFinished { job_id, .. } => *job_id,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast-based event bus.
///
/// Slow receivers that fall behind get a `Lagged` error and miss events; the
/// polling feeds remain the authoritative source of progress.
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Dropped silently without subscribers.
    pub fn emit(&self, event: ServerEvent) {
        let envelope = EventEnvelope::new(event);
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

// ============================================================================
// Tests
// ============================================================================
