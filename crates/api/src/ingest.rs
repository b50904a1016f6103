//! Upload Ingestor: streams a multipart video field to storage.
//!
//! The body is written chunk by chunk to a staging file (`*.part`) under the
//! storage root. The size ceiling is enforced while streaming, so an oversized
//! upload never occupies more than `max_bytes` of memory or disk. Only a fully
//! received file is renamed to its final collision-free name; every failure
//! path removes the staging file.

use std::path::{Path, PathBuf};

use axum::extract::multipart::{Field, Multipart};
use tokio::io::AsyncWriteExt;
use vidshare_core::media::remove_partial_output;
use vidshare_core::naming;
use vidshare_core::upload::validate_video_type;

use crate::error::{AppError, AppResult};

/// Name of the multipart field carrying the file.
pub const VIDEO_FIELD: &str = "video";

/// A fully received file waiting to be probed and registered.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    /// Final storage name.
    pub filename: String,
    /// Client-supplied name.
    pub original_name: String,
    /// Location of the finalized file.
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Read the `video` field of `multipart` into `storage_dir`.
///
/// Other fields are ignored. Fails with `BadRequest` when the field is missing
/// or empty, `Validation` for unsupported types and `PayloadTooLarge` once more
/// than `max_bytes` have been received.
pub async fn receive_video(
    multipart: &mut Multipart,
    storage_dir: &Path,
    max_bytes: u64,
) -> AppResult<StagedUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("The 'video' field must be a file".into()))?;
        let ext = validate_video_type(&original_name, field.content_type())?;

        tokio::fs::create_dir_all(storage_dir)
            .await
            .map_err(|e| AppError::InternalError(format!("create storage dir: {e}")))?;

        let staging = storage_dir.join(naming::staging_filename());
        let size_bytes = match stream_to_file(field, &staging, max_bytes).await {
            Ok(0) => {
                remove_partial_output(&staging).await;
                return Err(AppError::BadRequest("Uploaded file is empty".into()));
            }
            Ok(size) => size,
            Err(e) => {
                remove_partial_output(&staging).await;
                return Err(e);
            }
        };

        let filename = naming::upload_filename(&ext);
        let path = storage_dir.join(&filename);
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            remove_partial_output(&staging).await;
            return Err(AppError::InternalError(format!("finalize upload: {e}")));
        }

        tracing::debug!(%filename, %original_name, size_bytes, "Upload stored");
        return Ok(StagedUpload {
            filename,
            original_name,
            path,
            size_bytes,
        });
    }

    Err(AppError::BadRequest(format!(
        "Missing required '{VIDEO_FIELD}' field"
    )))
}

/// Copy `field` into a new file at `path`, returning the byte count.
async fn stream_to_file(mut field: Field<'_>, path: &Path, max_bytes: u64) -> AppResult<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| AppError::InternalError(format!("create {}: {e}", path.display())))?;

    let mut written: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the {max_bytes} byte upload limit"
            )));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::InternalError(format!("write {}: {e}", path.display())))?;
    }

    file.flush()
        .await
        .map_err(|e| AppError::InternalError(format!("flush {}: {e}", path.display())))?;
    Ok(written)
}
