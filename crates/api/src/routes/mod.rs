pub mod health;
pub mod jobs;
pub mod video;

use axum::Router;

use crate::state::AppState;

/// Build the API route tree.
///
/// Route hierarchy:
///
/// ```text
/// /videos                                 list (GET)
/// /videos/upload                          multipart upload (POST)
/// /videos/trim                            trim into a new video (POST)
/// /videos/merge                           merge into a new video (POST)
/// /videos/share                           issue a share link (POST)
/// /videos/share/{filename}                shared file (GET, unauthenticated)
/// /videos/{id}                            get (GET)
/// /videos/{id}/stream                     file bytes with Range support (GET)
///
/// /jobs                                   list (GET)
/// /jobs/{id}                              get (GET)
/// ```
///
/// Everything except `/videos/share/{filename}` requires a Bearer token.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/videos", video::router())
        .nest("/jobs", jobs::router())
}
