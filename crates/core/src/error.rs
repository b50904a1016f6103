use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Entities not found: {entity} with ids {ids:?}")]
    MissingEntities {
        entity: &'static str,
        ids: Vec<DbId>,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Video duration {duration:.2}s exceeds the {max}s limit")]
    DurationExceeded { duration: f64, max: u64 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
