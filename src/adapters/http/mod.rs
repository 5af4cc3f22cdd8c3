//! HTTP surface: upload and delete endpoints over the packaging services.

pub mod handlers;
pub mod response;

use crate::application::deletion::DeletionService;
use crate::application::packager::PackagingService;
use crate::ports::storage::StoragePort;
use crate::ports::transcoder::Transcoder;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use handlers::{delete_video, not_found, upload_video, MAX_UPLOAD_BYTES};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Room for multipart framing on top of the file itself.
const FORM_OVERHEAD_BYTES: u64 = 1024 * 1024;

pub struct AppState<S, T> {
    pub packager: Arc<PackagingService<S, T>>,
    pub deletion: Arc<DeletionService<S>>,
}

impl<S, T> AppState<S, T> {
    pub fn new(packager: Arc<PackagingService<S, T>>, deletion: Arc<DeletionService<S>>) -> Self {
        Self { packager, deletion }
    }
}

impl<S, T> Clone for AppState<S, T> {
    fn clone(&self) -> Self {
        Self {
            packager: Arc::clone(&self.packager),
            deletion: Arc::clone(&self.deletion),
        }
    }
}

pub fn router<S, T>(state: AppState<S, T>, frontend_url: Option<&str>) -> Router
where
    S: StoragePort + 'static,
    T: Transcoder + 'static,
{
    Router::new()
        .route("/videos/hls-upload", post(upload_video::<S, T>))
        .route("/videos/delete/:video_id", get(delete_video::<S, T>))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(
            (MAX_UPLOAD_BYTES + FORM_OVERHEAD_BYTES) as usize,
        ))
        .layer(cors_layer(frontend_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match frontend_url.map(|url| HeaderValue::from_str(url.trim_end_matches('/'))) {
        Some(Ok(origin)) => cors.allow_origin(origin),
        Some(Err(e)) => {
            warn!("Ignoring invalid FRONTEND_URL: {}", e);
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    }
}
