//! Scrape job repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use mediascrape_core::{Error, JobRepository, JobStatus, Result, ScrapeJob};

const JOB_COLUMNS: &str =
    "id, status, created_at, total_targets, done_targets, failed_targets";

/// PostgreSQL implementation of JobRepository.
pub struct PgJobRepository {
    pool: Pool<Postgres>,
}

impl PgJobRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert string from database to JobStatus.
    fn str_to_job_status(s: &str) -> JobStatus {
        s.parse().unwrap_or(JobStatus::Queued)
    }

    /// Parse a job row into a ScrapeJob.
    pub(crate) fn parse_job_row(row: sqlx::postgres::PgRow) -> ScrapeJob {
        ScrapeJob {
            id: row.get("id"),
            status: Self::str_to_job_status(row.get("status")),
            created_at: row.get("created_at"),
            total_targets: row.get("total_targets"),
            done_targets: row.get("done_targets"),
            failed_targets: row.get("failed_targets"),
        }
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn create_with_targets(&self, urls: &[String]) -> Result<ScrapeJob> {
        if urls.is_empty() {
            return Err(Error::InvalidInput("No valid urls".to_string()));
        }

        let job_id = Uuid::now_v7();
        let target_ids: Vec<Uuid> = urls.iter().map(|_| Uuid::now_v7()).collect();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(&format!(
            "INSERT INTO scrape_job (id, status, total_targets)
             VALUES ($1, 'queued', $2)
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_id)
        .bind(urls.len() as i32)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO scrape_target (id, job_id, source_url, status)
             SELECT t.id, $1, t.url, 'queued'
             FROM UNNEST($2::uuid[], $3::text[]) WITH ORDINALITY AS t(id, url, ord)
             ORDER BY t.ord",
        )
        .bind(job_id)
        .bind(&target_ids)
        .bind(urls)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "jobs",
            op = "create_with_targets",
            job_id = %job_id,
            total_targets = urls.len(),
            "Created job with targets"
        );
        Ok(Self::parse_job_row(row))
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<ScrapeJob>> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM scrape_job WHERE id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn record_outcome(&self, job_id: Uuid, ok: bool) -> Result<ScrapeJob> {
        let (done_inc, failed_inc): (i32, i32) = if ok { (1, 0) } else { (0, 1) };

        // SET expressions see the pre-update row; the row lock serializes
        // concurrent callers for the same job.
        let row = sqlx::query(&format!(
            "UPDATE scrape_job
             SET done_targets = done_targets + $2,
                 failed_targets = failed_targets + $3,
                 status = CASE
                     WHEN done_targets + failed_targets + 1 < total_targets THEN 'processing'
                     WHEN failed_targets + $3 > 0 THEN 'failed'
                     ELSE 'done'
                 END
             WHERE id = $1 AND done_targets + failed_targets < total_targets
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_id)
        .bind(done_inc)
        .bind(failed_inc)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => Ok(Self::parse_job_row(row)),
            None => self.get(job_id).await?.ok_or(Error::JobNotFound(job_id)),
        }
    }

    async fn delete(&self, job_id: Uuid) -> Result<bool> {
        // Targets and media cascade.
        let result = sqlx::query("DELETE FROM scrape_job WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for table in ["media_item", "scrape_target", "scrape_job"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}
