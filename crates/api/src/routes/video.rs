//! Route definitions for the `/videos` resource.
//!
//! ```text
//! GET  /                       list_videos
//! POST /upload                 upload_video
//! POST /trim                   trim_video
//! POST /merge                  merge_videos
//! POST /share                  create_share_link
//! GET  /share/{filename}       access_shared_video
//! GET  /{id}                   get_video
//! GET  /{id}/stream            stream_video
//! ```

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::video;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(video::list_videos))
        // The ingestor enforces the configured size limit while streaming.
        .route(
            "/upload",
            post(video::upload_video).layer(DefaultBodyLimit::disable()),
        )
        .route("/trim", post(video::trim_video))
        .route("/merge", post(video::merge_videos))
        .route("/share", post(video::create_share_link))
        .route("/share/{filename}", get(video::access_shared_video))
        .route("/{id}", get(video::get_video))
        .route("/{id}/stream", get(video::stream_video))
}
