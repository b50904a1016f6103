//! Job kinds and lifecycle statuses.
//!
//! A job is one trim or merge attempt. Its status only moves forward:
//!
//! ```text
//! pending -> running -> succeeded
//!                    \-> failed
//! ```
//!
//! Failures are terminal; a retry is a new job.

use serde::{Deserialize, Serialize};

pub const KIND_TRIM: &str = "trim";
pub const KIND_MERGE: &str = "merge";

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_RUNNING: &str = "running";
pub const STATUS_SUCCEEDED: &str = "succeeded";
pub const STATUS_FAILED: &str = "failed";

const VALID_STATUSES: &[&str] = &[
    STATUS_PENDING,
    STATUS_RUNNING,
    STATUS_SUCCEEDED,
    STATUS_FAILED,
];

/// What a job does to its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Trim,
    Merge,
}

impl JobKind {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            KIND_TRIM => Ok(Self::Trim),
            KIND_MERGE => Ok(Self::Merge),
            _ => Err(format!(
                "Invalid job kind '{s}'. Must be one of: {KIND_TRIM}, {KIND_MERGE}"
            )),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trim => KIND_TRIM,
            Self::Merge => KIND_MERGE,
        }
    }
}

/// Lifecycle statuses for jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            STATUS_PENDING => Ok(Self::Pending),
            STATUS_RUNNING => Ok(Self::Running),
            STATUS_SUCCEEDED => Ok(Self::Succeeded),
            STATUS_FAILED => Ok(Self::Failed),
            _ => Err(format!(
                "Invalid status '{s}'. Must be one of: {}",
                VALID_STATUSES.join(", ")
            )),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => STATUS_PENDING,
            Self::Running => STATUS_RUNNING,
            Self::Succeeded => STATUS_SUCCEEDED,
            Self::Failed => STATUS_FAILED,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether a job in this status may move to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}
