//! # mediascrape-jobs
//!
//! The scrape pipeline proper.
//!
//! This crate provides:
//! - [`JobOrchestrator`]: job submission, race-free outcome accounting, status queries
//! - [`TargetProcessor`]: fetch, extract and store media for one target
//! - [`ScrapeWorker`]: bounded-concurrency pool draining the task queue
//! - progress and media feeds for streaming clients
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mediascrape_jobs::{JobOrchestrator, OrchestratorConfig, TargetProcessor, WorkerBuilder, WorkerConfig};
//! use mediascrape_scraper::{FetchConfig, HttpFetcher};
//!
//! let store = db.store();
//! let orchestrator = JobOrchestrator::new(store.clone(), OrchestratorConfig::from_env());
//! let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from_env())?);
//!
//! let handle = WorkerBuilder::new(store.tasks.clone())
//!     .with_config(WorkerConfig::from_env())
//!     .with_handler(TargetProcessor::new(orchestrator.clone(), fetcher))
//!     .build()?
//!     .start();
//!
//! let resp = orchestrator.submit(&["example.com"]).await?;
//!
//! // Graceful shutdown
//! handle.shutdown_and_wait().await?;
//! ```

pub mod feed;
pub mod handler;
pub mod orchestrator;
pub mod worker;

// Re-export core types
pub use mediascrape_core::*;

pub use feed::{FeedConfig, MediaFeed, MediaFeedEvent, ProgressEvent};
pub use handler::{NoOpHandler, TargetProcessor, TaskContext, TaskHandler, TaskResult};
pub use orchestrator::{JobOrchestrator, OrchestratorConfig};
pub use worker::{ScrapeWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};
