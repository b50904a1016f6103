//! Handlers for the `/videos` resource.
//!
//! Uploads, trims and merges are delegated to the
//! [`JobOrchestrator`](crate::orchestrator::JobOrchestrator). Stored files are
//! streamed with HTTP range request support, either to authenticated callers
//! by id or to anyone holding a valid share link.

use std::path::Path as FsPath;

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{self, HeaderMap};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use vidshare_core::error::CoreError;
use vidshare_core::naming::is_safe_filename;
use vidshare_core::share_link::{validate_ttl, LinkError};
use vidshare_core::types::{DbId, Timestamp};
use vidshare_db::models::video::{Video, VideoFilter};
use vidshare_db::repositories::VideoRepo;

use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::ingest;
use crate::middleware::auth::AuthUser;
use crate::query::VideoListParams;
use crate::state::AppState;

/// Maximum read chunk size for open-ended range requests (1 MiB).
const MAX_CHUNK_SIZE: u64 = 1024 * 1024;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimRequest {
    pub video_id: DbId,
    /// Seconds from the start of the source.
    pub start_time: f64,
    pub end_time: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    /// Sources in concatenation order.
    pub video_ids: Vec<DbId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub video_id: DbId,
    /// Link lifetime in seconds.
    pub expiry_time: i64,
}

#[derive(Debug, Deserialize)]
pub struct ShareAccessParams {
    pub expiry: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub video: Video,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimResponse {
    pub message: &'static str,
    pub trimmed_video: Video,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    pub message: &'static str,
    pub merged_video: Video,
}

/// One entry of `GET /videos`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListItem {
    pub id: DbId,
    pub filename: String,
    pub original_name: String,
    /// Seconds.
    pub duration: f64,
    /// Bytes.
    pub size: i64,
    /// Authenticated stream URL.
    pub url: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkResponse {
    pub link: String,
    /// Unix timestamp (seconds) after which the link is refused.
    pub expires_at: i64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Guess a Content-Type from a file extension.
fn content_type_for_extension(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// Parse a `Range: bytes=START-END` header value.
/// Returns `(start, optional_end)`.
fn parse_range_header(range: &str) -> Option<(u64, Option<u64>)> {
    let range = range.strip_prefix("bytes=")?;
    let (start, end) = range.split_once('-')?;
    let start = start.parse::<u64>().ok()?;
    let end = if end.is_empty() {
        None
    } else {
        Some(end.parse::<u64>().ok()?)
    };
    Some((start, end))
}

fn build_response(builder: axum::http::response::Builder, body: Body) -> AppResult<Response> {
    builder
        .body(body)
        .map_err(|e| AppError::InternalError(format!("build response: {e}")))
}

/// Stream `path`, honouring a single-range `Range` header.
async fn serve_file(path: &FsPath, headers: &HeaderMap) -> AppResult<Response> {
    let display_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) if m.is_file() => m,
        _ => return Err(AppError::FileNotFound(display_name)),
    };
    let file_size = metadata.len();
    let content_type = content_type_for_extension(&display_name);

    if let Some(range_value) = headers.get(header::RANGE) {
        let range_str = range_value
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid Range header".into()))?;

        if let Some((start, end)) = parse_range_header(range_str) {
            if start >= file_size {
                return build_response(
                    Response::builder()
                        .status(StatusCode::RANGE_NOT_SATISFIABLE)
                        .header(header::CONTENT_RANGE, format!("bytes */{file_size}")),
                    Body::empty(),
                );
            }
            let last = file_size - 1;
            let end = end
                .map(|e| e.min(last))
                .unwrap_or_else(|| start.saturating_add(MAX_CHUNK_SIZE - 1).min(last));
            if start > end {
                return build_response(
                    Response::builder()
                        .status(StatusCode::RANGE_NOT_SATISFIABLE)
                        .header(header::CONTENT_RANGE, format!("bytes */{file_size}")),
                    Body::empty(),
                );
            }

            let length = end - start + 1;

            let mut file = tokio::fs::File::open(path)
                .await
                .map_err(|e| AppError::InternalError(e.to_string()))?;
            file.seek(std::io::SeekFrom::Start(start))
                .await
                .map_err(|e| AppError::InternalError(e.to_string()))?;

            let stream = ReaderStream::new(file.take(length));

            return build_response(
                Response::builder()
                    .status(StatusCode::PARTIAL_CONTENT)
                    .header(header::CONTENT_TYPE, content_type)
                    .header(header::CONTENT_LENGTH, length.to_string())
                    .header(
                        header::CONTENT_RANGE,
                        format!("bytes {start}-{end}/{file_size}"),
                    )
                    .header(header::ACCEPT_RANGES, "bytes"),
                Body::from_stream(stream),
            );
        }
    }

    // No usable Range header: serve the full file.
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    build_response(
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, file_size.to_string())
            .header(header::ACCEPT_RANGES, "bytes"),
        Body::from_stream(ReaderStream::new(file)),
    )
}

async fn find_video(state: &AppState, id: DbId) -> AppResult<Video> {
    VideoRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Video", id }))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /videos/upload
///
/// Multipart form with a required `video` file field.
pub async fn upload_video(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let orchestrator = &state.orchestrator;
    let staged = ingest::receive_video(
        &mut multipart,
        orchestrator.storage_dir(),
        orchestrator.limits().max_bytes,
    )
    .await?;

    let video = orchestrator
        .register_upload(staged, Some(user.user_id))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "Video uploaded successfully",
            video,
        }),
    ))
}

/// POST /videos/trim
pub async fn trim_video(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(input): AppJson<TrimRequest>,
) -> AppResult<(StatusCode, Json<TrimResponse>)> {
    let trimmed_video = state
        .orchestrator
        .trim(
            input.video_id,
            input.start_time,
            input.end_time,
            Some(user.user_id),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TrimResponse {
            message: "Video trimmed successfully",
            trimmed_video,
        }),
    ))
}

/// POST /videos/merge
pub async fn merge_videos(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(input): AppJson<MergeRequest>,
) -> AppResult<(StatusCode, Json<MergeResponse>)> {
    let merged_video = state
        .orchestrator
        .merge(&input.video_ids, Some(user.user_id))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MergeResponse {
            message: "Videos merged successfully",
            merged_video,
        }),
    ))
}

/// GET /videos
///
/// Newest first. `?mine=true` restricts the listing to the caller's videos.
pub async fn list_videos(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<VideoListParams>,
) -> AppResult<Json<Vec<VideoListItem>>> {
    let filter = VideoFilter {
        owner_id: params.mine.then_some(user.user_id),
        limit: params.limit,
        offset: params.offset,
    };
    let videos = VideoRepo::list(&state.pool, &filter).await?;

    let base = state.config.public_base_url.trim_end_matches('/');
    let items = videos
        .into_iter()
        .map(|v| VideoListItem {
            url: format!("{base}/videos/{}/stream", v.id),
            id: v.id,
            filename: v.filename,
            original_name: v.original_name,
            duration: v.duration_secs,
            size: v.size_bytes,
            created_at: v.created_at,
        })
        .collect();

    Ok(Json(items))
}

/// GET /videos/{id}
pub async fn get_video(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<Video>> {
    Ok(Json(find_video(&state, id).await?))
}

/// GET /videos/{id}/stream
pub async fn stream_video(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<DbId>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let video = find_video(&state, id).await?;
    serve_file(FsPath::new(&video.storage_path), &headers).await
}

/// POST /videos/share
///
/// Issues a link granting unauthenticated read access for `expiryTime` seconds.
pub async fn create_share_link(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(input): AppJson<ShareRequest>,
) -> AppResult<Json<ShareLinkResponse>> {
    validate_ttl(input.expiry_time, state.config.max_share_ttl_secs)?;
    let video = find_video(&state, input.video_id).await?;

    let now = chrono::Utc::now().timestamp();
    let token = state.signer.issue(&video.filename, input.expiry_time, now);

    tracing::info!(
        video_id = video.id,
        user_id = user.user_id,
        expiry = token.expiry,
        "Share link issued",
    );

    Ok(Json(ShareLinkResponse {
        link: token.to_url(&state.config.public_base_url),
        expires_at: token.expiry,
    }))
}

/// GET /videos/share/{filename}?expiry=&signature=
///
/// Unauthenticated. Validity depends only on the link itself; the metadata
/// store is not consulted.
pub async fn access_shared_video(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(params): Query<ShareAccessParams>,
    headers: HeaderMap,
) -> AppResult<Response> {
    if !is_safe_filename(&filename) {
        return Err(LinkError::Malformed("invalid filename".into()).into());
    }
    let expiry: i64 = params
        .expiry
        .as_deref()
        .ok_or_else(|| LinkError::Malformed("missing expiry".into()))?
        .parse()
        .map_err(|_| LinkError::Malformed("expiry must be a unix timestamp".into()))?;
    let signature = params
        .signature
        .as_deref()
        .ok_or_else(|| LinkError::Malformed("missing signature".into()))?;

    let now = chrono::Utc::now().timestamp();
    if let Err(e) = state.signer.verify(&filename, expiry, signature, now) {
        tracing::info!(%filename, expiry, reason = %e, "Share link refused");
        return Err(e.into());
    }

    serve_file(&state.config.storage_dir.join(&filename), &headers).await
}
