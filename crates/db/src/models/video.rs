//! Video artifact rows and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use vidshare_core::error::CoreError;
use vidshare_core::types::{DbId, Timestamp};

/// A row from the `videos` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: DbId,
    pub filename: String,
    pub original_name: String,
    /// Location of the backing file. Internal; never sent to clients.
    #[serde(skip_serializing)]
    pub storage_path: String,
    #[serde(rename = "durationSeconds")]
    pub duration_secs: f64,
    pub size_bytes: i64,
    pub owner_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering a finalized file.
#[derive(Debug, Clone)]
pub struct CreateVideo {
    pub filename: String,
    pub original_name: String,
    pub storage_path: String,
    pub duration_secs: f64,
    pub size_bytes: i64,
    pub owner_id: Option<DbId>,
}

impl CreateVideo {
    /// Reject missing or out-of-range fields.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.filename.trim().is_empty() {
            return Err(CoreError::Validation("filename must not be empty".into()));
        }
        if self.original_name.trim().is_empty() {
            return Err(CoreError::Validation(
                "original name must not be empty".into(),
            ));
        }
        if self.storage_path.trim().is_empty() {
            return Err(CoreError::Validation(
                "storage path must not be empty".into(),
            ));
        }
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            return Err(CoreError::Validation(format!(
                "duration must be a non-negative number, got {}",
                self.duration_secs
            )));
        }
        if self.size_bytes < 0 {
            return Err(CoreError::Validation(format!(
                "size must be non-negative, got {}",
                self.size_bytes
            )));
        }
        Ok(())
    }
}

/// Filter for [`VideoRepo::list`](crate::repositories::VideoRepo::list).
#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    /// Only rows created on behalf of this principal.
    pub owner_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CreateVideo {
        CreateVideo {
            filename: "1_a.mp4".into(),
            original_name: "clip.mp4".into(),
            storage_path: "uploads/1_a.mp4".into(),
            duration_secs: 12.5,
            size_bytes: 1024,
            owner_id: Some(1),
        }
    }

    #[test]
    fn valid_input_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn negative_values_fail() {
        let mut input = valid();
        input.duration_secs = -0.1;
        assert!(input.validate().is_err());

        let mut input = valid();
        input.size_bytes = -1;
        assert!(input.validate().is_err());

        let mut input = valid();
        input.duration_secs = f64::NAN;
        assert!(input.validate().is_err());
    }

    #[test]
    fn empty_strings_fail() {
        let mut input = valid();
        input.storage_path = " ".into();
        assert!(input.validate().is_err());

        let mut input = valid();
        input.filename.clear();
        assert!(input.validate().is_err());
    }
}
