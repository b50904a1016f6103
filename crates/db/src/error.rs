use vidshare_core::error::CoreError;

/// Failure of a repository call that validates its input before writing.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The input was rejected before reaching the database.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
