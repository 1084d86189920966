//! Media repository implementation and filter query builder.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use mediascrape_core::{
    escape_like, search_groups, Error, ExtractedMedia, MediaCursor, MediaFilter, MediaItem,
    MediaPage, MediaQuery, MediaRepository, MediaType, Result,
};

/// Type-safe parameter binding for generated media queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Uuid(Uuid),
    String(String),
    StringArray(Vec<String>),
    Timestamp(DateTime<Utc>),
    BigInt(i64),
}

/// Generates the WHERE clause for a [`MediaFilter`].
///
/// ```rust,ignore
/// let (sql, params) = MediaFilterQueryBuilder::new(&filter, 0).build();
/// // sql: "m.type = $1 AND (m.source_url ILIKE ANY($2::text[]) OR m.media_url ILIKE ANY($2::text[]))"
/// ```
///
/// Search tokens become one AND-ed clause each; the token's variants are
/// passed as an array of escaped `%variant%` patterns.
pub struct MediaFilterQueryBuilder<'a> {
    filter: &'a MediaFilter,
    after: Option<MediaCursor>,
    param_offset: usize,
}

impl<'a> MediaFilterQueryBuilder<'a> {
    /// `param_offset` is the number of parameters already in the query.
    pub fn new(filter: &'a MediaFilter, param_offset: usize) -> Self {
        Self {
            filter,
            after: None,
            param_offset,
        }
    }

    /// Restrict to items sorting strictly after the cursor.
    pub fn after(mut self, cursor: Option<MediaCursor>) -> Self {
        self.after = cursor;
        self
    }

    /// Returns the SQL fragment (`TRUE` when unrestricted) and its parameters.
    pub fn build(&self) -> (String, Vec<QueryParam>) {
        let mut clauses = Vec::new();
        let mut params = Vec::new();
        let mut idx = self.param_offset;

        if let Some(job_id) = self.filter.job_id {
            idx += 1;
            clauses.push(format!("m.job_id = ${idx}"));
            params.push(QueryParam::Uuid(job_id));
        }

        if let Some(media_type) = self.filter.media_type {
            idx += 1;
            clauses.push(format!("m.type = ${idx}"));
            params.push(QueryParam::String(media_type.as_str().to_string()));
        }

        if let Some(search) = &self.filter.search {
            for variants in search_groups(search) {
                idx += 1;
                clauses.push(format!(
                    "(m.source_url ILIKE ANY(${idx}::text[]) OR m.media_url ILIKE ANY(${idx}::text[]))"
                ));
                let patterns = variants
                    .iter()
                    .map(|v| format!("%{}%", escape_like(v)))
                    .collect();
                params.push(QueryParam::StringArray(patterns));
            }
        }

        if let Some(cursor) = self.after {
            clauses.push(format!("(m.created_at, m.id) > (${}, ${})", idx + 1, idx + 2));
            params.push(QueryParam::Timestamp(cursor.created_at));
            params.push(QueryParam::Uuid(cursor.id));
        }

        if clauses.is_empty() {
            ("TRUE".to_string(), params)
        } else {
            (clauses.join(" AND "), params)
        }
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::Uuid(v) => query.bind(v),
            QueryParam::String(v) => query.bind(v),
            QueryParam::StringArray(v) => query.bind(v),
            QueryParam::Timestamp(v) => query.bind(v),
            QueryParam::BigInt(v) => query.bind(v),
        };
    }
    query
}

/// Advisory lock key serializing media inserts.
///
/// `created_at` is taken at insert time, so two overlapping transactions
/// could commit out of timestamp order and a feed cursor could move past a
/// row that becomes visible later. Holding this lock until commit keeps the
/// committed rows a prefix of the `(created_at, id)` order.
const MEDIA_INSERT_LOCK_KEY: i64 = 0x6d65_6469_615f_6964;

const MEDIA_COLUMNS: &str = "m.id, m.job_id, m.type, m.source_url, m.media_url, m.created_at";

/// PostgreSQL implementation of MediaRepository.
pub struct PgMediaRepository {
    pool: Pool<Postgres>,
}

impl PgMediaRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_media_row(row: sqlx::postgres::PgRow) -> Result<MediaItem> {
        let media_type: String = row.get("type");
        Ok(MediaItem {
            id: row.get("id"),
            job_id: row.get("job_id"),
            media_type: media_type.parse::<MediaType>()?,
            source_url: row.get("source_url"),
            media_url: row.get("media_url"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl MediaRepository for PgMediaRepository {
    async fn insert_if_absent(
        &self,
        job_id: Uuid,
        source_url: &str,
        items: &[ExtractedMedia],
    ) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = items.iter().map(|_| Uuid::now_v7()).collect();
        let types: Vec<&str> = items.iter().map(|i| i.media_type.as_str()).collect();
        let urls: Vec<&str> = items.iter().map(|i| i.media_url.as_str()).collect();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MEDIA_INSERT_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let inserted = sqlx::query(
            "INSERT INTO media_item (id, job_id, type, source_url, media_url)
             SELECT t.id, $1, t.type, $2, t.media_url
             FROM UNNEST($3::uuid[], $4::text[], $5::text[]) WITH ORDINALITY AS t(id, type, media_url, ord)
             ORDER BY t.ord
             ON CONFLICT (source_url, media_url, type) DO NOTHING",
        )
        .bind(job_id)
        .bind(source_url)
        .bind(&ids)
        .bind(&types)
        .bind(&urls)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        tx.commit().await.map_err(Error::Database)?;
        Ok(inserted)
    }

    async fn list(&self, query: &MediaQuery) -> Result<MediaPage> {
        let (where_sql, params) = MediaFilterQueryBuilder::new(&query.filter, 0).build();

        let count_sql = format!("SELECT COUNT(*) AS total FROM media_item m WHERE {where_sql}");
        let total: i64 = bind_params(sqlx::query(&count_sql), &params)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?
            .get("total");

        let limit_idx = params.len() + 1;
        let list_sql = format!(
            "SELECT {MEDIA_COLUMNS} FROM media_item m
             WHERE {where_sql}
             ORDER BY m.created_at DESC, m.id DESC
             LIMIT ${} OFFSET ${}",
            limit_idx,
            limit_idx + 1
        );
        let mut list_params = params.clone();
        list_params.push(QueryParam::BigInt(query.limit));
        list_params.push(QueryParam::BigInt(query.offset()));

        let rows = bind_params(sqlx::query(&list_sql), &list_params)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let items = rows
            .into_iter()
            .map(Self::parse_media_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(MediaPage::new(items, query, total))
    }

    async fn list_after(
        &self,
        filter: &MediaFilter,
        after: Option<MediaCursor>,
        limit: i64,
    ) -> Result<Vec<MediaItem>> {
        let (where_sql, mut params) = MediaFilterQueryBuilder::new(filter, 0).after(after).build();
        let sql = format!(
            "SELECT {MEDIA_COLUMNS} FROM media_item m
             WHERE {where_sql}
             ORDER BY m.created_at ASC, m.id ASC
             LIMIT ${}",
            params.len() + 1
        );
        params.push(QueryParam::BigInt(limit));

        let rows = bind_params(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_media_row).collect()
    }
}
