#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tokio::sync::{Notify, Semaphore};
use tower::ServiceExt;

use vidshare_api::auth::jwt::{generate_access_token, JwtConfig};
use vidshare_api::config::ServerConfig;
use vidshare_api::router::build_app_router;
use vidshare_api::state::AppState;
use vidshare_core::media::{validate_trim_range, MediaError, MediaWorker, ProbeInfo};
use vidshare_core::upload::UploadLimits;
use vidshare_db::models::video::{CreateVideo, Video};
use vidshare_db::repositories::VideoRepo;
use vidshare_db::DbPool;

pub const TEST_SHARE_SECRET: &str = "test-share-secret";
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-that-is-long-enough";
pub const TEST_BASE_URL: &str = "http://localhost:3000";

const FAKE_PREFIX: &str = "FAKEVIDEO:";

/// Contents of a file the fake worker probes as `duration_secs` long.
pub fn fake_video_bytes(duration_secs: f64) -> Vec<u8> {
    format!("{FAKE_PREFIX}{duration_secs}").into_bytes()
}

/// Media worker that understands `FAKEVIDEO:<secs>` files instead of real
/// containers and records every call.
#[derive(Default)]
pub struct FakeMediaWorker {
    pub probe_calls: AtomicUsize,
    pub trim_calls: AtomicUsize,
    pub merge_calls: AtomicUsize,
    /// Inputs of every merge, in the order they were passed.
    pub merge_inputs: Mutex<Vec<Vec<PathBuf>>>,
    /// Make trims and merges write a partial output and then fail.
    pub fail_jobs: AtomicBool,
    /// Signalled when a trim starts.
    pub trim_entered: Notify,
    /// When set, each trim writes a partial output and then consumes one
    /// permit before producing the real one.
    pub trim_gate: Option<Arc<Semaphore>>,
}

impl FakeMediaWorker {
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            trim_gate: Some(gate),
            ..Default::default()
        }
    }

    async fn read_duration(path: &Path) -> Result<f64, MediaError> {
        let probe_err = |reason: &str| MediaError::Probe {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| probe_err(&e.to_string()))?;
        text.strip_prefix(FAKE_PREFIX)
            .and_then(|d| d.trim().parse::<f64>().ok())
            .ok_or_else(|| probe_err("not a video"))
    }

    async fn fail_with_partial(&self, output: &Path) -> Result<(), MediaError> {
        tokio::fs::write(output, b"partial").await.ok();
        Err(MediaError::Processing(
            "codec exploded: /secret/internal/path".into(),
        ))
    }
}

#[async_trait]
impl MediaWorker for FakeMediaWorker {
    async fn probe(&self, path: &Path) -> Result<ProbeInfo, MediaError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let duration_secs = Self::read_duration(path).await?;
        Ok(ProbeInfo {
            duration_secs,
            format_name: Some("fake".into()),
            video_codec: Some("fake".into()),
            width: Some(640),
            height: Some(360),
            has_audio: false,
        })
    }

    async fn trim(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        end_secs: f64,
    ) -> Result<(), MediaError> {
        self.trim_calls.fetch_add(1, Ordering::SeqCst);
        if self.trim_gate.is_some() {
            // Like a real encoder, output appears before the work is done.
            tokio::fs::write(output, b"partial").await.ok();
        }
        self.trim_entered.notify_one();
        if let Some(gate) = &self.trim_gate {
            gate.acquire()
                .await
                .map_err(|e| MediaError::Processing(e.to_string()))?
                .forget();
        }
        validate_trim_range(start_secs, end_secs)?;
        Self::read_duration(input).await?;
        if self.fail_jobs.load(Ordering::SeqCst) {
            return self.fail_with_partial(output).await;
        }
        tokio::fs::write(output, fake_video_bytes(end_secs - start_secs))
            .await
            .map_err(|e| MediaError::Processing(e.to_string()))
    }

    async fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError> {
        self.merge_calls.fetch_add(1, Ordering::SeqCst);
        self.merge_inputs.lock().unwrap().push(inputs.to_vec());
        if self.fail_jobs.load(Ordering::SeqCst) {
            return self.fail_with_partial(output).await;
        }
        let mut total = 0.0;
        for input in inputs {
            total += Self::read_duration(input).await?;
        }
        tokio::fs::write(output, fake_video_bytes(total))
            .await
            .map_err(|e| MediaError::Processing(e.to_string()))
    }
}

/// Build a test `ServerConfig` storing artifacts under `storage_dir`.
pub fn test_config(storage_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: "sqlite::memory:".to_string(),
        storage_dir: storage_dir.to_path_buf(),
        public_base_url: TEST_BASE_URL.to_string(),
        share_link_secret: TEST_SHARE_SECRET.to_string(),
        max_share_ttl_secs: 7 * 24 * 60 * 60,
        upload: UploadLimits::default(),
        ffmpeg_path: "ffmpeg".to_string(),
        ffprobe_path: "ffprobe".to_string(),
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub pool: DbPool,
    pub worker: Arc<FakeMediaWorker>,
    pub config: ServerConfig,
    /// Storage root; removed when the app is dropped.
    pub storage: TempDir,
}

impl TestApp {
    pub fn storage_dir(&self) -> &Path {
        self.storage.path()
    }

    /// Whether an in-flight job currently holds `video_id`.
    pub fn orchestrator_holds(&self, video_id: i64) -> bool {
        self.state.orchestrator.locks().is_held(video_id)
    }

    /// Names of every file currently in the storage root.
    pub fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.storage_dir())
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Insert a video backed by a fake file, bypassing the upload endpoint.
    pub async fn seed_video(&self, name: &str, duration_secs: f64) -> Video {
        let path = self.storage_dir().join(name);
        tokio::fs::write(&path, fake_video_bytes(duration_secs))
            .await
            .unwrap();
        let size = std::fs::metadata(&path).unwrap().len() as i64;
        VideoRepo::create(
            &self.pool,
            &CreateVideo {
                filename: name.to_string(),
                original_name: name.to_string(),
                storage_path: path.to_string_lossy().to_string(),
                duration_secs,
                size_bytes: size,
                owner_id: Some(1),
            },
        )
        .await
        .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn build_test_app() -> TestApp {
    build_test_app_with(FakeMediaWorker::default(), |_| {}).await
}

/// Build the full application router over an in-memory database, a temporary
/// storage root and the given fake worker.
pub async fn build_test_app_with(
    worker: FakeMediaWorker,
    tweak: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let pool = vidshare_db::create_in_memory_pool().await.unwrap();
    vidshare_db::run_migrations(&pool).await.unwrap();

    let storage = tempfile::tempdir().unwrap();
    let mut config = test_config(storage.path());
    tweak(&mut config);

    let worker = Arc::new(worker);
    let state = AppState::new(pool.clone(), config.clone(), worker.clone());
    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        pool,
        worker,
        config,
        storage,
    }
}

/// A valid bearer token for `user_id`.
pub fn token_for(user_id: i64) -> String {
    let config = JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        access_token_expiry_mins: 15,
    };
    generate_access_token(user_id, &config).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn authed_get(uri: &str, user_id: i64) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(user_id)))
        .body(Body::empty())
        .unwrap()
}

pub fn authed_json(uri: &str, user_id: i64, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(user_id)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

const BOUNDARY: &str = "vidshare-test-boundary";

/// A `multipart/form-data` upload with a single file field.
pub fn upload_request(
    field: &str,
    filename: &str,
    content_type: &str,
    bytes: &[u8],
    user_id: Option<i64>,
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/videos/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(user_id) = user_id {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user_id)));
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
