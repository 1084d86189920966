//! Forwards worker events onto the event bus.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mediascrape_core::{EventBus, ScrapeJob, ServerEvent};
use mediascrape_jobs::WorkerEvent;

/// Translate one worker event into the server events it implies.
///
/// A target outcome that completed its job is followed by `JobFinished`.
pub fn translate(event: WorkerEvent) -> Vec<ServerEvent> {
    match event {
        WorkerEvent::TaskStarted {
            job_id, source_url, ..
        } => vec![ServerEvent::TargetStarted { job_id, source_url }],
        WorkerEvent::TaskCompleted {
            job_id,
            source_url,
            media_found,
            inserted,
            job,
            ..
        } => with_finish(
            ServerEvent::TargetCompleted {
                job_id,
                source_url,
                media_found,
                inserted,
            },
            job,
        ),
        WorkerEvent::TaskFailed {
            job_id,
            source_url,
            error,
            job,
            ..
        } => with_finish(
            ServerEvent::TargetFailed {
                job_id,
                source_url,
                error,
            },
            job,
        ),
        WorkerEvent::TaskRetry { .. } | WorkerEvent::WorkerStarted | WorkerEvent::WorkerStopped => {
            Vec::new()
        }
    }
}

fn with_finish(event: ServerEvent, job: Option<ScrapeJob>) -> Vec<ServerEvent> {
    let mut out = vec![event];
    if let Some(job) = job.filter(|j| j.status.is_terminal()) {
        out.push(ServerEvent::JobFinished {
            job_id: job.id,
            status: job.status,
            done_targets: job.done_targets,
            failed_targets: job.failed_targets,
        });
    }
    out
}

/// Spawn the bridge task. It ends when the worker's event channel closes.
pub fn spawn_event_bridge(
    mut rx: broadcast::Receiver<WorkerEvent>,
    bus: Arc<EventBus>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    for server_event in translate(event) {
                        bus.emit(server_event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(subsystem = "api", skipped, "Event bridge lagged behind worker");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(subsystem = "api", "Event bridge stopped");
    })
}
