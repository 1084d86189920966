//! PostgreSQL-backed task queue with lease-based redelivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use mediascrape_core::{defaults, Error, Result, ScrapeTask, TaskQueue};

/// PostgreSQL implementation of TaskQueue.
///
/// `claim` hides a task for the lease duration instead of deleting it; a
/// worker that dies before `ack` lets the lease run out and the task becomes
/// claimable again.
pub struct PgTaskQueue {
    pool: Pool<Postgres>,
    lease: Duration,
    /// Notify handle for event-driven worker wake.
    notify: Arc<Notify>,
}

impl PgTaskQueue {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            lease: Duration::from_secs(defaults::TASK_LEASE_SECS),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    fn parse_task_row(row: sqlx::postgres::PgRow) -> ScrapeTask {
        ScrapeTask {
            id: row.get("id"),
            job_id: row.get("job_id"),
            url: row.get("url"),
            attempts: row.get("attempts"),
        }
    }
}

#[async_trait]
impl TaskQueue for PgTaskQueue {
    async fn enqueue(&self, job_id: Uuid, urls: &[String]) -> Result<usize> {
        if urls.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Uuid> = urls.iter().map(|_| Uuid::now_v7()).collect();

        let inserted = sqlx::query(
            "INSERT INTO scrape_task (id, job_id, url)
             SELECT t.id, $1, t.url
             FROM UNNEST($2::uuid[], $3::text[]) WITH ORDINALITY AS t(id, url, ord)
             ORDER BY t.ord",
        )
        .bind(job_id)
        .bind(&ids)
        .bind(urls)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        self.notify.notify_waiters();
        Ok(inserted as usize)
    }

    async fn claim(&self) -> Result<Option<ScrapeTask>> {
        // FOR UPDATE SKIP LOCKED lets concurrent claimers pass each other.
        let row = sqlx::query(
            "UPDATE scrape_task
             SET attempts = attempts + 1,
                 visible_at = clock_timestamp() + make_interval(secs => $1)
             WHERE id = (
                 SELECT id FROM scrape_task
                 WHERE visible_at <= clock_timestamp()
                 ORDER BY visible_at ASC, created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING id, job_id, url, attempts",
        )
        .bind(self.lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let task = row.map(Self::parse_task_row);
        if let Some(task) = &task {
            if task.attempts > 1 {
                debug!(
                    subsystem = "db",
                    component = "tasks",
                    op = "claim",
                    task_id = %task.id,
                    attempts = task.attempts,
                    "Redelivering task after expired lease"
                );
            }
        }
        Ok(task)
    }

    async fn ack(&self, task_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM scrape_task WHERE id = $1")
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scrape_task")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }

    fn notifier(&self) -> Arc<Notify> {
        self.notify.clone()
    }
}
