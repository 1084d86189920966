//! # mediascrape-core
//!
//! Core types, traits, and abstractions for the mediascrape pipeline.
//!
//! This crate provides the foundational data structures (jobs, targets,
//! media items, tasks), the repository and fetcher traits that the storage
//! and scraper crates implement, URL normalization, and the event bus used
//! for push notifications.

pub mod defaults;
pub mod env;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod search;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{EventBus, EventEnvelope, ServerEvent};
pub use models::*;
pub use normalize::{normalize_batch, normalize_url};
pub use search::{escape_like, expand_search_token, matches_search, search_groups};
pub use traits::*;
