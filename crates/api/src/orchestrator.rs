//! Job orchestrator for uploads, trims and merges.
//!
//! Coordinates metadata lookups, per-source exclusion, the media worker and
//! job bookkeeping. Held in [`AppState`](crate::state::AppState) as an
//! `Arc<JobOrchestrator>`.
//!
//! A trim or merge runs through these steps:
//! 1. Validate the request and look up every source (no job row yet).
//! 2. Claim the sources; a busy source is refused with `Conflict`.
//! 3. Create the job row (pending) and mark it running.
//! 4. Invoke the media worker into a fresh, collision-free output path.
//! 5. Probe the output and register it as a new video.
//! 6. Record the outcome. Success inserts the output video and marks the job
//!    succeeded in one transaction; failure removes the output file and marks
//!    the job failed, so no video row or stray file is left behind.
//!
//! Steps 4 to 6 run under a [`RunningJob`]. If the request future is dropped
//! in between (request timeout, client disconnect) the job is failed and its
//! output removed in the background, and the sources stay claimed until that
//! cleanup has finished.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use vidshare_core::error::CoreError;
use vidshare_core::job::{JobKind, JobStatus};
use vidshare_core::media::{
    remove_partial_output, validate_trim_range, MediaError, MediaWorker, MIN_MERGE_INPUTS,
};
use vidshare_core::naming;
use vidshare_core::source_lock::{SourceGuard, SourceLocks};
use vidshare_core::types::DbId;
use vidshare_core::upload::{check_duration, UploadLimits};
use vidshare_db::models::job::CreateJob;
use vidshare_db::models::video::{CreateVideo, Video};
use vidshare_db::repositories::{JobRepo, VideoRepo};
use vidshare_db::DbPool;

use crate::error::{AppError, AppResult};
use crate::ingest::StagedUpload;

/// `originalName` given to every merge output.
pub const MERGED_ORIGINAL_NAME: &str = "Merged Video";

/// Message stored on jobs that failed inside the media tool.
const MEDIA_FAILURE_MESSAGE: &str = "Video processing failed";

/// Message stored on jobs abandoned before they finished.
const CANCELLED_MESSAGE: &str = "Job cancelled before completion";

pub struct JobOrchestrator {
    pool: DbPool,
    media: Arc<dyn MediaWorker>,
    storage_dir: PathBuf,
    limits: UploadLimits,
    locks: SourceLocks,
}

impl JobOrchestrator {
    pub fn new(
        pool: DbPool,
        media: Arc<dyn MediaWorker>,
        storage_dir: PathBuf,
        limits: UploadLimits,
    ) -> Self {
        Self {
            pool,
            media,
            storage_dir,
            limits,
            locks: SourceLocks::new(),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Sources currently held by an in-flight job.
    pub fn locks(&self) -> &SourceLocks {
        &self.locks
    }

    /// Probe a received upload and register it.
    ///
    /// The stored file is deleted whenever no record is created, including
    /// when the probed duration exceeds the configured ceiling.
    pub async fn register_upload(
        &self,
        upload: StagedUpload,
        owner_id: Option<DbId>,
    ) -> AppResult<Video> {
        match self.register_upload_inner(&upload, owner_id).await {
            Ok(video) => {
                tracing::info!(
                    video_id = video.id,
                    filename = %video.filename,
                    duration_secs = video.duration_secs,
                    "Upload registered",
                );
                Ok(video)
            }
            Err(e) => {
                tracing::info!(filename = %upload.filename, error = %e, "Upload rejected");
                remove_partial_output(&upload.path).await;
                Err(e)
            }
        }
    }

    async fn register_upload_inner(
        &self,
        upload: &StagedUpload,
        owner_id: Option<DbId>,
    ) -> AppResult<Video> {
        let info = self.media.probe(&upload.path).await?;
        check_duration(info.duration_secs, &self.limits)?;

        let video = VideoRepo::create(
            &self.pool,
            &CreateVideo {
                filename: upload.filename.clone(),
                original_name: upload.original_name.clone(),
                storage_path: path_string(&upload.path),
                duration_secs: info.duration_secs,
                size_bytes: i64::try_from(upload.size_bytes).unwrap_or(i64::MAX),
                owner_id,
            },
        )
        .await?;
        Ok(video)
    }

    /// Cut `[start_secs, end_secs)` out of a stored video into a new video.
    ///
    /// `end_secs` past the end of the source is clamped to its duration.
    pub async fn trim(
        &self,
        video_id: DbId,
        start_secs: f64,
        end_secs: f64,
        requested_by: Option<DbId>,
    ) -> AppResult<Video> {
        validate_trim_range(start_secs, end_secs).map_err(as_validation)?;

        let source = VideoRepo::find_by_id(&self.pool, video_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Video",
                id: video_id,
            })?;

        if start_secs >= source.duration_secs {
            return Err(CoreError::Validation(format!(
                "startTime ({start_secs}) must be less than the video duration ({})",
                source.duration_secs
            ))
            .into());
        }
        let end_secs = end_secs.min(source.duration_secs);

        let sources = self.locks.try_acquire(&[video_id])?;

        let job_id = self
            .start_job(
                JobKind::Trim,
                vec![video_id],
                json!({ "startTime": start_secs, "endTime": end_secs }),
                requested_by,
            )
            .await?;

        let output = self.storage_dir.join(naming::trimmed_filename(&source.filename));
        let input = PathBuf::from(&source.storage_path);
        let run = RunningJob::new(self.pool.clone(), job_id, output.clone(), sources);
        let work = self.media.trim(&input, &output, start_secs, end_secs);

        self.run_job(run, work, &source.original_name, requested_by)
            .await
    }

    /// Concatenate stored videos, in the given order, into a new video.
    ///
    /// Duplicate ids are allowed and merged in once per occurrence. If any id
    /// has no record the request fails before the media worker is invoked.
    pub async fn merge(&self, video_ids: &[DbId], requested_by: Option<DbId>) -> AppResult<Video> {
        if video_ids.len() < MIN_MERGE_INPUTS {
            return Err(CoreError::Validation(format!(
                "videoIds must contain at least {MIN_MERGE_INPUTS} ids"
            ))
            .into());
        }

        let found: HashMap<DbId, Video> = VideoRepo::find_by_ids(&self.pool, video_ids)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect();

        let requested: BTreeSet<DbId> = video_ids.iter().copied().collect();
        let missing: Vec<DbId> = requested
            .iter()
            .copied()
            .filter(|id| !found.contains_key(id))
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::MissingEntities {
                entity: "Video",
                ids: missing,
            }
            .into());
        }

        // Caller order, not storage order.
        let inputs: Vec<PathBuf> = video_ids
            .iter()
            .filter_map(|id| found.get(id))
            .map(|v| PathBuf::from(&v.storage_path))
            .collect();

        let sources = self.locks.try_acquire(video_ids)?;

        let job_id = self
            .start_job(JobKind::Merge, video_ids.to_vec(), json!({}), requested_by)
            .await?;

        let output = self.storage_dir.join(naming::merged_filename());
        let run = RunningJob::new(self.pool.clone(), job_id, output.clone(), sources);
        let work = self.media.merge(&inputs, &output);

        self.run_job(run, work, MERGED_ORIGINAL_NAME, requested_by)
            .await
    }

    /// Drive the media work of a started job and record its outcome.
    async fn run_job<F>(
        &self,
        run: RunningJob,
        work: F,
        original_name: &str,
        requested_by: Option<DbId>,
    ) -> AppResult<Video>
    where
        F: Future<Output = Result<(), MediaError>>,
    {
        let result = match work.await {
            Ok(()) => {
                self.register_output(run.job_id, &run.output, original_name, requested_by)
                    .await
            }
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(video) => {
                tracing::info!(job_id = run.job_id, video_id = video.id, "Job succeeded");
                run.disarm();
                Ok(video)
            }
            Err(err) => {
                self.fail_job(&run, &err).await;
                run.disarm();
                Err(err)
            }
        }
    }

    /// Record a new job and move it to `running`.
    ///
    /// A job that was created but could not be started is failed before the
    /// error is returned, so it never lingers as `pending`.
    async fn start_job(
        &self,
        kind: JobKind,
        source_video_ids: Vec<DbId>,
        params: serde_json::Value,
        requested_by: Option<DbId>,
    ) -> AppResult<DbId> {
        let job = JobRepo::create(
            &self.pool,
            &CreateJob {
                kind,
                source_video_ids,
                params,
                requested_by,
            },
        )
        .await?;

        let started = match JobRepo::mark_running(&self.pool, job.id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(self.transition_refused(job.id, JobStatus::Running).await),
            Err(e) => Err(AppError::from(e)),
        };
        if let Err(err) = started {
            if let Err(e) = JobRepo::fail(&self.pool, job.id, "Job could not be started").await {
                tracing::error!(job_id = job.id, error = %e, "Failed to record job failure");
            }
            return Err(err);
        }

        tracing::info!(job_id = job.id, kind = kind.as_str(), "Job started");
        Ok(job.id)
    }

    /// Probe a finished output file, insert its record and mark the job
    /// succeeded, atomically.
    async fn register_output(
        &self,
        job_id: DbId,
        output: &Path,
        original_name: &str,
        owner_id: Option<DbId>,
    ) -> AppResult<Video> {
        let info = self.media.probe(output).await?;
        let size_bytes = tokio::fs::metadata(output)
            .await
            .map_err(|e| MediaError::Processing(format!("stat {}: {e}", output.display())))?
            .len();

        let filename = output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| AppError::InternalError("output path has no file name".into()))?;

        let recorded = JobRepo::succeed_with_video(
            &self.pool,
            job_id,
            &CreateVideo {
                filename,
                original_name: original_name.to_string(),
                storage_path: path_string(output),
                duration_secs: info.duration_secs,
                size_bytes: i64::try_from(size_bytes).unwrap_or(i64::MAX),
                owner_id,
            },
        )
        .await?;

        match recorded {
            Some(video) => Ok(video),
            None => Err(self.transition_refused(job_id, JobStatus::Succeeded).await),
        }
    }

    /// Remove the output of a failed job and mark it failed.
    async fn fail_job(&self, run: &RunningJob, err: &AppError) {
        remove_partial_output(&run.output).await;
        let message = match err {
            AppError::Media(_) => MEDIA_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        };
        match JobRepo::fail(&self.pool, run.job_id, &message).await {
            Ok(true) => {}
            Ok(false) => {
                let refused = self.transition_refused(run.job_id, JobStatus::Failed).await;
                tracing::error!(job_id = run.job_id, error = %refused, "Job failure not recorded");
            }
            Err(e) => {
                tracing::error!(job_id = run.job_id, error = %e, "Failed to record job failure")
            }
        }
        tracing::warn!(job_id = run.job_id, error = %err, "Job failed");
    }

    /// Describe a guarded status update that matched no row.
    async fn transition_refused(&self, job_id: DbId, next: JobStatus) -> AppError {
        let current = match JobRepo::find_by_id(&self.pool, job_id).await {
            Ok(Some(job)) => job.status().ok(),
            _ => None,
        };
        let reason = match current {
            Some(status) if status.is_terminal() => {
                format!("job {job_id} already {}", status.as_str())
            }
            Some(status) if !status.can_transition_to(next) => format!(
                "job {job_id} cannot move from {} to {}",
                status.as_str(),
                next.as_str()
            ),
            Some(status) => format!(
                "job {job_id} did not move from {} to {}",
                status.as_str(),
                next.as_str()
            ),
            None => format!("job {job_id} is missing or unreadable"),
        };
        AppError::InternalError(reason)
    }
}

/// A started job that has not recorded its outcome yet.
///
/// Dropping it while armed means the request future was abandoned mid-job.
/// The job is then failed and its output removed on a background task, and
/// the source claim is released only once that has run.
struct RunningJob {
    job_id: DbId,
    output: PathBuf,
    cleanup: Option<(DbPool, SourceGuard)>,
}

impl RunningJob {
    fn new(pool: DbPool, job_id: DbId, output: PathBuf, sources: SourceGuard) -> Self {
        Self {
            job_id,
            output,
            cleanup: Some((pool, sources)),
        }
    }

    /// The outcome is recorded; release the sources.
    fn disarm(mut self) {
        self.cleanup = None;
    }
}

impl Drop for RunningJob {
    fn drop(&mut self) {
        let Some((pool, sources)) = self.cleanup.take() else {
            return;
        };
        let job_id = self.job_id;
        let output = std::mem::take(&mut self.output);
        let sources_held: Vec<DbId> = sources.ids().collect();

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(job_id, ?sources_held, "Job abandoned outside a runtime; left running");
            return;
        };
        tracing::warn!(job_id, ?sources_held, "Job abandoned before completion");

        handle.spawn(async move {
            match JobRepo::fail(&pool, job_id, CANCELLED_MESSAGE).await {
                Ok(true) => remove_partial_output(&output).await,
                Ok(false) => tracing::debug!(job_id, "Abandoned job had already finished"),
                Err(e) => {
                    tracing::error!(job_id, error = %e, "Failed to record job cancellation")
                }
            }
            drop(sources);
        });
    }
}

fn as_validation(err: MediaError) -> CoreError {
    match err {
        MediaError::Processing(msg) => CoreError::Validation(msg),
        other => CoreError::Validation(other.to_string()),
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
