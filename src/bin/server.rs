//! Server Binary - HLS upload and packaging service
//!
//! Wires up:
//! - the ffmpeg encoder
//! - filesystem or S3 object storage
//! - the packaging and deletion services behind the HTTP router

use axum::Router;
use hls_packager::adapters::http::{router, AppState};
use hls_packager::adapters::local::{FfmpegTranscoder, FsAdapter};
use hls_packager::application::deletion::DeletionService;
use hls_packager::application::packager::PackagingService;
use hls_packager::application::workspace::WorkspaceManager;
use hls_packager::config::{Config, StorageBackend};
use hls_packager::domain::layout::RemoteLayout;
use hls_packager::ports::storage::StoragePort;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let transcoder =
        FfmpegTranscoder::new(config.ffmpeg.clone()).with_timeout(config.encode_timeout);

    let app = match &config.storage {
        StorageBackend::Fs { root } => {
            let storage = FsAdapter::new(root, config.public_base_url.clone());
            info!("Serving packages from {} at /media", root.display());
            build_app(&config, storage, transcoder).nest_service("/media", ServeDir::new(root))
        }
        #[cfg(feature = "aws")]
        StorageBackend::S3 { bucket } => {
            let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let client = aws_sdk_s3::Client::new(&aws_config);
            let storage = hls_packager::adapters::aws::s3::S3Adapter::new(
                client,
                bucket.clone(),
                config.public_base_url.clone(),
            );
            info!("Publishing packages to s3://{}", bucket);
            build_app(&config, storage, transcoder)
        }
        #[cfg(not(feature = "aws"))]
        StorageBackend::S3 { .. } => {
            error!("STORAGE_BACKEND=s3 requires the `aws` feature");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(config.bind_address()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", config.bind_address(), e);
            std::process::exit(1);
        }
    };
    info!("Listening at {}", config.bind_address());
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

fn build_app<S>(config: &Config, storage: S, transcoder: FfmpegTranscoder) -> Router
where
    S: StoragePort + Clone + 'static,
{
    let layout = RemoteLayout::new(&config.public_base_url, &config.storage_folder);
    let packager = PackagingService::new(
        storage.clone(),
        transcoder,
        WorkspaceManager::new(&config.temp_dir),
        layout.clone(),
    )
    .with_upload_timeout(config.upload_timeout);
    let deletion = DeletionService::new(storage, layout);

    let state = AppState::new(Arc::new(packager), Arc::new(deletion));
    router(state, config.frontend_url.as_deref())
}
