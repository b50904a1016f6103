//! Upload policy: accepted containers, size ceiling and duration ceiling.

use crate::error::CoreError;
use crate::naming::extension_of;

/// Accepted container extensions.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];

/// Accepted declared content types. Generic binary uploads fall back to the
/// extension check alone.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/avi",
    "video/msvideo",
    "video/x-matroska",
];

const GENERIC_MIME_TYPE: &str = "application/octet-stream";

/// Maximum accepted upload size (100 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Maximum accepted probed duration in seconds.
pub const DEFAULT_MAX_DURATION_SECS: u64 = 120;

/// Limits applied to incoming uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: u64,
    pub max_duration_secs: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
        }
    }
}

/// Validate the client-supplied name and content type of an upload.
///
/// Returns the normalised extension to use for the stored file.
pub fn validate_video_type(
    original_name: &str,
    content_type: Option<&str>,
) -> Result<String, CoreError> {
    let ext = extension_of(original_name)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "Unsupported file '{original_name}'. Videos only: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;

    if let Some(mime) = content_type {
        let mime = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if mime != GENERIC_MIME_TYPE && !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
            return Err(CoreError::Validation(format!(
                "Unsupported content type '{mime}'. Videos only"
            )));
        }
    }

    Ok(ext)
}

/// Reject a probed duration above `limits.max_duration_secs`.
pub fn check_duration(duration_secs: f64, limits: &UploadLimits) -> Result<(), CoreError> {
    if duration_secs > limits.max_duration_secs as f64 {
        return Err(CoreError::DurationExceeded {
            duration: duration_secs,
            max: limits.max_duration_secs,
        });
    }
    Ok(())
}
