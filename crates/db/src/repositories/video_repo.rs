//! Repository for the `videos` table.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use vidshare_core::types::DbId;

use crate::error::DbError;
use crate::models::video::{CreateVideo, Video, VideoFilter};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, filename, original_name, storage_path, duration_secs, \
    size_bytes, owner_id, created_at, updated_at";

/// Default page size for [`VideoRepo::list`].
const DEFAULT_LIST_LIMIT: i64 = 100;

/// Hard ceiling on the page size for [`VideoRepo::list`].
const MAX_LIST_LIMIT: i64 = 1000;

pub struct VideoRepo;

impl VideoRepo {
    /// Validate and insert a video row.
    ///
    /// A single `INSERT ... RETURNING`, so the row is visible in full or not
    /// at all. Ids come from `AUTOINCREMENT` and are never reused.
    pub async fn create(pool: &SqlitePool, input: &CreateVideo) -> Result<Video, DbError> {
        input.validate()?;
        let mut conn = pool.acquire().await?;
        Self::insert_inner(&mut conn, input).await
    }

    /// Insert an already validated row on `conn`, which may be a transaction.
    pub(crate) async fn insert_inner(
        conn: &mut SqliteConnection,
        input: &CreateVideo,
    ) -> Result<Video, DbError> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO videos
                (filename, original_name, storage_path, duration_secs, size_bytes, owner_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING {COLUMNS}"
        );
        let video = sqlx::query_as::<_, Video>(&query)
            .bind(&input.filename)
            .bind(&input.original_name)
            .bind(&input.storage_path)
            .bind(input.duration_secs)
            .bind(input.size_bytes)
            .bind(input.owner_id)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;
        Ok(video)
    }

    /// Find a video by its ID.
    pub async fn find_by_id(pool: &SqlitePool, id: DbId) -> Result<Option<Video>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM videos WHERE id = $1");
        sqlx::query_as::<_, Video>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find all videos whose id is in `ids`.
    ///
    /// Each matching row is returned once, in storage order. Callers that
    /// care about the requested order must re-map the result themselves.
    pub async fn find_by_ids(pool: &SqlitePool, ids: &[DbId]) -> Result<Vec<Video>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=ids.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!("SELECT {COLUMNS} FROM videos WHERE id IN ({placeholders})");

        let mut q = sqlx::query_as::<_, Video>(&query);
        for id in ids {
            q = q.bind(id);
        }
        q.fetch_all(pool).await
    }

    /// List videos, newest first.
    pub async fn list(pool: &SqlitePool, filter: &VideoFilter) -> Result<Vec<Video>, sqlx::Error> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        let offset = filter.offset.unwrap_or(0).max(0);

        let query = format!(
            "SELECT {COLUMNS} FROM videos
             WHERE ($1 IS NULL OR owner_id = $1)
             ORDER BY id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Video>(&query)
            .bind(filter.owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Total number of stored videos.
    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM videos")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}
