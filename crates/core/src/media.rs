//! Media worker contract.
//!
//! The service never touches codecs itself. Probing, trimming and
//! concatenation are delegated to a [`MediaWorker`], an async trait object
//! held by the job orchestrator. The production implementation shells out to
//! ffmpeg/ffprobe (see [`crate::ffmpeg::FfmpegWorker`]); tests substitute a
//! scripted fake.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

/// Minimum number of inputs accepted by a merge.
pub const MIN_MERGE_INPUTS: usize = 2;

/// Metadata reported by a successful probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeInfo {
    /// Container duration in seconds. Never negative.
    pub duration_secs: f64,
    /// Container format name as reported by the tool (e.g. `"mov,mp4,m4a"`).
    pub format_name: Option<String>,
    /// Codec of the first video stream.
    pub video_codec: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// Whether the file carries at least one audio stream.
    pub has_audio: bool,
}

/// Failure reported by a media worker.
///
/// The `String` payloads carry tool diagnostics. They are meant for logs;
/// the HTTP layer replaces them with a generic message.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("probe failed for {path}: {reason}")]
    Probe { path: String, reason: String },

    #[error("media processing failed: {0}")]
    Processing(String),

    #[error("media tool unavailable: {0}")]
    ToolUnavailable(String),
}

/// Contract for the external media tool.
///
/// Every call is a single awaited operation that completes exactly once.
/// Implementations must not block the async runtime.
#[async_trait]
pub trait MediaWorker: Send + Sync {
    /// Inspect `path` and report its duration and stream layout.
    async fn probe(&self, path: &Path) -> Result<ProbeInfo, MediaError>;

    /// Cut `[start_secs, end_secs)` out of `input` into `output`.
    ///
    /// On failure no file is left at `output`.
    async fn trim(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        end_secs: f64,
    ) -> Result<(), MediaError>;

    /// Concatenate `inputs` into `output` in exactly the given order.
    ///
    /// On failure no file is left at `output`.
    async fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError>;
}

/// Check a trim window before handing it to a worker.
pub fn validate_trim_range(start_secs: f64, end_secs: f64) -> Result<(), MediaError> {
    if !start_secs.is_finite() || !end_secs.is_finite() {
        return Err(MediaError::Processing(
            "trim bounds must be finite numbers".into(),
        ));
    }
    if start_secs < 0.0 {
        return Err(MediaError::Processing(format!(
            "start time must be >= 0, got {start_secs}"
        )));
    }
    if end_secs <= start_secs {
        return Err(MediaError::Processing(format!(
            "end time ({end_secs}) must be greater than start time ({start_secs})"
        )));
    }
    Ok(())
}

/// Check merge inputs: at least [`MIN_MERGE_INPUTS`] and all present on disk.
pub async fn validate_merge_inputs(inputs: &[PathBuf]) -> Result<(), MediaError> {
    if inputs.len() < MIN_MERGE_INPUTS {
        return Err(MediaError::Processing(format!(
            "merge needs at least {MIN_MERGE_INPUTS} inputs, got {}",
            inputs.len()
        )));
    }
    for input in inputs {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(MediaError::Processing(format!(
                "merge input missing: {}",
                input.display()
            )));
        }
    }
    Ok(())
}

/// Remove whatever a failed operation may have left at `path`.
///
/// A missing file is not an error.
pub async fn remove_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial output")
        }
    }
}
