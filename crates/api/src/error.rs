use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use vidshare_core::error::CoreError;
use vidshare_core::media::MediaError;
use vidshare_core::share_link::LinkError;
use vidshare_db::DbError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `vidshare_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The external media tool failed. Diagnostics are logged, never returned.
    #[error(transparent)]
    Media(#[from] MediaError),

    /// A share link was refused.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request body exceeded a configured size limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// A stored file is missing from disk.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Invalid(core) => AppError::Core(core),
            DbError::Sqlx(e) => AppError::Database(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    /// Serde's wording stays in the logs; clients get a stable message.
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected JSON body");
        match rejection {
            JsonRejection::JsonDataError(_) => AppError::Core(CoreError::Validation(
                "Request body has missing or invalid fields".to_string(),
            )),
            JsonRejection::JsonSyntaxError(_) => {
                AppError::BadRequest("Request body is not valid JSON".to_string())
            }
            JsonRejection::MissingJsonContentType(_) => AppError::BadRequest(
                "Expected request with `Content-Type: application/json`".to_string(),
            ),
            _ => AppError::BadRequest("Unreadable request body".to_string()),
        }
    }
}

fn internal(message: &str) -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        message.to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::MissingEntities { entity, ids } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} not found for ids {ids:?}"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::DurationExceeded { .. } => {
                    (StatusCode::BAD_REQUEST, "DURATION_EXCEEDED", core.to_string())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal("An internal error occurred")
                }
            },

            // --- Media tool failures ---
            AppError::Media(err) => {
                tracing::error!(error = %err, "Media processing error");
                internal("Video processing failed")
            }

            // --- Share links ---
            AppError::Link(err) => match err {
                LinkError::InvalidSignature => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_SIGNATURE",
                    "Invalid link signature".to_string(),
                ),
                LinkError::Malformed(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_LINK", msg.clone())
                }
                LinkError::Expired => (
                    StatusCode::GONE,
                    "LINK_EXPIRED",
                    "This link has expired".to_string(),
                ),
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::BAD_REQUEST, "PAYLOAD_TOO_LARGE", msg.clone())
            }
            AppError::FileNotFound(name) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("File '{name}' not found"),
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal("An internal error occurred")
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => (
            StatusCode::CONFLICT,
            "CONFLICT",
            "Duplicate value violates a unique constraint".to_string(),
        ),
        other => {
            tracing::error!(error = %other, "Database error");
            internal("An internal error occurred")
        }
    }
}
