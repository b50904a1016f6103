use std::sync::Arc;

use vidshare_core::media::MediaWorker;
use vidshare_core::share_link::ShareSigner;

use crate::config::ServerConfig;
use crate::orchestrator::JobOrchestrator;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: vidshare_db::DbPool,
    /// Server configuration, built once at startup.
    pub config: Arc<ServerConfig>,
    /// Runs uploads, trims and merges against the media worker.
    pub orchestrator: Arc<JobOrchestrator>,
    /// Issues and verifies share links.
    pub signer: ShareSigner,
}

impl AppState {
    pub fn new(pool: vidshare_db::DbPool, config: ServerConfig, media: Arc<dyn MediaWorker>) -> Self {
        let orchestrator = JobOrchestrator::new(
            pool.clone(),
            media,
            config.storage_dir.clone(),
            config.upload,
        );
        let signer = ShareSigner::new(&config.share_link_secret);

        Self {
            pool,
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            signer,
        }
    }
}
