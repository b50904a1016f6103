//! Repository for the `jobs` table.
//!
//! Status transitions are guarded in SQL, so each update only applies when
//! the job is in the expected prior state. The `bool` results report whether
//! the transition happened.

use chrono::Utc;
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use vidshare_core::job::{STATUS_FAILED, STATUS_PENDING, STATUS_RUNNING, STATUS_SUCCEEDED};
use vidshare_core::types::DbId;

use crate::error::DbError;
use crate::models::job::{CreateJob, Job};
use crate::models::video::{CreateVideo, Video};
use crate::repositories::VideoRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, kind, status, source_video_ids, params, output_video_id, \
    error_message, requested_by, created_at, started_at, completed_at, updated_at";

/// Default page size for [`JobRepo::list`].
const DEFAULT_LIST_LIMIT: i64 = 50;

/// Hard ceiling on the page size for [`JobRepo::list`].
const MAX_LIST_LIMIT: i64 = 500;

pub struct JobRepo;

impl JobRepo {
    /// Record a new job in the `pending` state.
    pub async fn create(pool: &SqlitePool, input: &CreateJob) -> Result<Job, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO jobs
                (kind, status, source_video_ids, params, requested_by, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(input.kind.as_str())
            .bind(STATUS_PENDING)
            .bind(Json(&input.source_video_ids))
            .bind(Json(&input.params))
            .bind(input.requested_by)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &SqlitePool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List jobs, newest first.
    pub async fn list(
        pool: &SqlitePool,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let offset = offset.unwrap_or(0).max(0);

        let query = format!("SELECT {COLUMNS} FROM jobs ORDER BY id DESC LIMIT $1 OFFSET $2");
        sqlx::query_as::<_, Job>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// `pending -> running`.
    pub async fn mark_running(pool: &SqlitePool, id: DbId) -> Result<bool, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE jobs SET status = $1, started_at = $2, updated_at = $2 \
             WHERE id = $3 AND status = $4",
        )
        .bind(STATUS_RUNNING)
        .bind(now)
        .bind(id)
        .bind(STATUS_PENDING)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `running -> succeeded`, recording the produced video.
    pub async fn succeed(
        pool: &SqlitePool,
        id: DbId,
        output_video_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::succeed_inner(&mut conn, id, output_video_id).await
    }

    /// Insert the output video and mark the job succeeded in one transaction.
    ///
    /// Returns `None`, with nothing written, when the job is no longer
    /// running.
    pub async fn succeed_with_video(
        pool: &SqlitePool,
        id: DbId,
        output: &CreateVideo,
    ) -> Result<Option<Video>, DbError> {
        output.validate()?;
        let mut tx = pool.begin().await?;

        let video = VideoRepo::insert_inner(&mut tx, output).await?;
        if !Self::succeed_inner(&mut tx, id, video.id).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(video))
    }

    async fn succeed_inner(
        conn: &mut SqliteConnection,
        id: DbId,
        output_video_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE jobs SET status = $1, output_video_id = $2, completed_at = $3, updated_at = $3 \
             WHERE id = $4 AND status = $5",
        )
        .bind(STATUS_SUCCEEDED)
        .bind(output_video_id)
        .bind(now)
        .bind(id)
        .bind(STATUS_RUNNING)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `pending|running -> failed`, recording the reason.
    pub async fn fail(pool: &SqlitePool, id: DbId, error_message: &str) -> Result<bool, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE jobs SET status = $1, error_message = $2, completed_at = $3, updated_at = $3 \
             WHERE id = $4 AND status IN ($5, $6)",
        )
        .bind(STATUS_FAILED)
        .bind(error_message)
        .bind(now)
        .bind(id)
        .bind(STATUS_PENDING)
        .bind(STATUS_RUNNING)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
