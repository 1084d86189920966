//! # mediascrape-db
//!
//! Storage layer for mediascrape.
//!
//! This crate provides:
//! - PostgreSQL repositories for jobs, targets and media (sqlx)
//! - A PostgreSQL-backed task queue with lease-based redelivery
//! - An in-memory store with the same semantics
//! - Connection pool management and migrations
//!
//! ## Example
//!
//! ```rust,ignore
//! use mediascrape_db::{create_pool_with_config, Database, PoolConfig};
//!
//! let pool = create_pool_with_config("postgres://localhost/mediascrape", PoolConfig::from_env()).await?;
//! let db = Database::new(pool);
//! db.migrate().await?;
//! let store = db.store();
//! ```

pub mod jobs;
pub mod media;
pub mod memory;
pub mod pool;
pub mod targets;
pub mod tasks;
pub mod test_fixtures;

use std::sync::Arc;
use std::time::Duration;

pub use jobs::PgJobRepository;
pub use media::{MediaFilterQueryBuilder, PgMediaRepository, QueryParam};
pub use memory::MemoryStore;
pub use pool::{create_pool_with_config, PoolConfig};
pub use targets::PgTargetRepository;
pub use tasks::PgTaskQueue;

// Re-export core types
pub use mediascrape_core::*;

/// PostgreSQL-backed storage with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub jobs: Arc<PgJobRepository>,
    pub targets: Arc<PgTargetRepository>,
    pub media: Arc<PgMediaRepository>,
    pub tasks: Arc<PgTaskQueue>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self::with_task_lease(pool, Duration::from_secs(defaults::TASK_LEASE_SECS))
    }

    /// Create a Database whose task queue uses the given lease duration.
    pub fn with_task_lease(pool: sqlx::Pool<sqlx::Postgres>, lease: Duration) -> Self {
        Self {
            jobs: Arc::new(PgJobRepository::new(pool.clone())),
            targets: Arc::new(PgTargetRepository::new(pool.clone())),
            media: Arc::new(PgMediaRepository::new(pool.clone())),
            tasks: Arc::new(PgTaskQueue::new(pool.clone()).with_lease(lease)),
            pool,
        }
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Bundle the repositories for the pipeline.
    pub fn store(&self) -> Store {
        Store {
            jobs: self.jobs.clone(),
            targets: self.targets.clone(),
            media: self.media.clone(),
            tasks: self.tasks.clone(),
        }
    }
}
