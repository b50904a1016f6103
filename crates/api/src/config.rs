use std::path::PathBuf;

use vidshare_core::ffmpeg::{DEFAULT_FFMPEG_BIN, DEFAULT_FFPROBE_BIN};
use vidshare_core::share_link::DEFAULT_MAX_TTL_SECS;
use vidshare_core::upload::{UploadLimits, DEFAULT_MAX_DURATION_SECS, DEFAULT_MAX_UPLOAD_BYTES};

use crate::auth::jwt::JwtConfig;

/// Default SQLite database, created next to the binary on first start.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://vidshare.db?mode=rwc";

/// Server configuration loaded from environment variables.
///
/// Built once at startup and shared through [`AppState`](crate::state::AppState).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `300`, media jobs run inline).
    pub request_timeout_secs: u64,
    pub database_url: String,
    /// Root directory for stored artifacts.
    pub storage_dir: PathBuf,
    /// Scheme and authority prefixed to generated share links.
    pub public_base_url: String,
    /// HMAC key for share links.
    pub share_link_secret: String,
    /// Longest lifetime a share link may be issued with.
    pub max_share_ttl_secs: i64,
    pub upload: UploadLimits,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// JWT validation settings.
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                         |
    /// |------------------------|---------------------------------|
    /// | `HOST`                 | `0.0.0.0`                       |
    /// | `PORT`                 | `3000`                          |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`         |
    /// | `REQUEST_TIMEOUT_SECS` | `300`                           |
    /// | `DATABASE_URL`         | `sqlite://vidshare.db?mode=rwc` |
    /// | `STORAGE_DIR`          | `uploads`                       |
    /// | `PUBLIC_BASE_URL`      | `http://localhost:3000`         |
    /// | `SHARE_LINK_SECRET`    | **required**                    |
    /// | `MAX_SHARE_TTL_SECS`   | `604800`                        |
    /// | `MAX_UPLOAD_BYTES`     | `104857600`                     |
    /// | `MAX_DURATION_SECS`    | `120`                           |
    /// | `FFMPEG_PATH`          | `ffmpeg`                        |
    /// | `FFPROBE_PATH`         | `ffprobe`                       |
    ///
    /// JWT settings are read by [`JwtConfig::from_env`].
    ///
    /// # Panics
    ///
    /// Panics on unparseable numbers and when `SHARE_LINK_SECRET` is missing or
    /// empty.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.into());

        let storage_dir =
            PathBuf::from(std::env::var("STORAGE_DIR").unwrap_or_else(|_| "uploads".into()));

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"));

        let share_link_secret = std::env::var("SHARE_LINK_SECRET")
            .expect("SHARE_LINK_SECRET must be set in the environment");
        assert!(
            !share_link_secret.is_empty(),
            "SHARE_LINK_SECRET must not be empty"
        );

        let max_share_ttl_secs: i64 = std::env::var("MAX_SHARE_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_MAX_TTL_SECS.to_string())
            .parse()
            .expect("MAX_SHARE_TTL_SECS must be a valid i64");

        let max_bytes: u64 = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_BYTES.to_string())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid u64");

        let max_duration_secs: u64 = std::env::var("MAX_DURATION_SECS")
            .unwrap_or_else(|_| DEFAULT_MAX_DURATION_SECS.to_string())
            .parse()
            .expect("MAX_DURATION_SECS must be a valid u64");

        let ffmpeg_path =
            std::env::var("FFMPEG_PATH").unwrap_or_else(|_| DEFAULT_FFMPEG_BIN.into());
        let ffprobe_path =
            std::env::var("FFPROBE_PATH").unwrap_or_else(|_| DEFAULT_FFPROBE_BIN.into());

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url,
            storage_dir,
            public_base_url,
            share_link_secret,
            max_share_ttl_secs,
            upload: UploadLimits {
                max_bytes,
                max_duration_secs,
            },
            ffmpeg_path,
            ffprobe_path,
            jwt,
        }
    }
}
