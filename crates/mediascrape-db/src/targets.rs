//! Scrape target repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use mediascrape_core::{
    Error, Result, ScrapeTarget, TargetClaim, TargetOutcome, TargetRepository, TargetStatus,
};

/// PostgreSQL implementation of TargetRepository.
pub struct PgTargetRepository {
    pool: Pool<Postgres>,
}

impl PgTargetRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn str_to_target_status(s: &str) -> TargetStatus {
        s.parse().unwrap_or(TargetStatus::Queued)
    }

    fn parse_target_row(row: sqlx::postgres::PgRow) -> ScrapeTarget {
        ScrapeTarget {
            id: row.get("id"),
            job_id: row.get("job_id"),
            source_url: row.get("source_url"),
            status: Self::str_to_target_status(row.get("status")),
            error: row.get("error"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl TargetRepository for PgTargetRepository {
    async fn begin(&self, job_id: Uuid, source_url: &str) -> Result<TargetClaim> {
        let started = sqlx::query(
            "UPDATE scrape_target
             SET status = 'processing', updated_at = clock_timestamp()
             WHERE job_id = $1 AND source_url = $2 AND status IN ('queued', 'processing')",
        )
        .bind(job_id)
        .bind(source_url)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        if started > 0 {
            return Ok(TargetClaim::Started);
        }

        let exists: Option<String> = sqlx::query_scalar(
            "SELECT status FROM scrape_target WHERE job_id = $1 AND source_url = $2",
        )
        .bind(job_id)
        .bind(source_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(match exists {
            Some(_) => TargetClaim::AlreadyFinished,
            None => TargetClaim::NotFound,
        })
    }

    async fn finish(
        &self,
        job_id: Uuid,
        source_url: &str,
        outcome: &TargetOutcome,
    ) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE scrape_target
             SET status = $3, error = $4, updated_at = clock_timestamp()
             WHERE job_id = $1 AND source_url = $2 AND status IN ('queued', 'processing')",
        )
        .bind(job_id)
        .bind(source_url)
        .bind(outcome.status().as_str())
        .bind(outcome.error())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<ScrapeTarget>> {
        let rows = sqlx::query(
            "SELECT id, job_id, source_url, status, error, created_at, updated_at
             FROM scrape_target
             WHERE job_id = $1
             ORDER BY created_at ASC, id ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_target_row).collect())
    }
}
