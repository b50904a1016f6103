//! Handlers for the `/jobs` resource (read-only job history).

use axum::extract::{Path, Query, State};
use axum::Json;
use vidshare_core::error::CoreError;
use vidshare_core::types::DbId;
use vidshare_db::models::job::Job;
use vidshare_db::repositories::JobRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::state::AppState;

/// GET /jobs
///
/// Most recent first.
pub async fn list_jobs(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<Vec<Job>>> {
    let jobs = JobRepo::list(&state.pool, params.limit, params.offset).await?;
    Ok(Json(jobs))
}

/// GET /jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<Job>> {
    let job = JobRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Job", id }))?;
    Ok(Json(job))
}
