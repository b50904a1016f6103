//! Job rows and DTOs.

use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;
use vidshare_core::job::{JobKind, JobStatus};
use vidshare_core::types::{DbId, Timestamp};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: DbId,
    pub kind: String,
    pub status: String,
    /// Source ids in the order the caller supplied them.
    pub source_video_ids: Json<Vec<DbId>>,
    pub params: Json<serde_json::Value>,
    pub output_video_id: Option<DbId>,
    pub error_message: Option<String>,
    pub requested_by: Option<DbId>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl Job {
    pub fn kind(&self) -> Result<JobKind, String> {
        JobKind::from_str_value(&self.kind)
    }

    pub fn status(&self) -> Result<JobStatus, String> {
        JobStatus::from_str_value(&self.status)
    }
}

/// DTO for recording a new job in the `pending` state.
#[derive(Debug, Clone)]
pub struct CreateJob {
    pub kind: JobKind,
    pub source_video_ids: Vec<DbId>,
    pub params: serde_json::Value,
    pub requested_by: Option<DbId>,
}
