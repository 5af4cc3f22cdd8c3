use super::response::{ApiError, ApiResponse};
use super::AppState;
use crate::application::packager::validate_source_name;
use crate::domain::layout::PredictedUrls;
use crate::error::PipelineError;
use crate::ports::storage::StoragePort;
use crate::ports::transcoder::Transcoder;
use axum::body::Bytes;
use axum::extract::{Multipart, Path as UrlPath, State};
use axum::http::StatusCode;
use axum::{BoxError, Json};
use futures::{Stream, TryStreamExt};
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;
use tracing::info;

/// Largest accepted source file.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
/// Multipart form field carrying the source file.
pub const UPLOAD_FIELD: &str = "video";

pub async fn upload_video<S, T>(
    State(state): State<AppState<S, T>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<PredictedUrls>>, ApiError>
where
    S: StoragePort + 'static,
    T: Transcoder + 'static,
{
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => return Err(ApiError::bad_request("No video file provided")),
        };
        // Rejected before any workspace exists.
        let extension = validate_source_name(&file_name)?;

        let job = state.packager.create_job(&extension).await?;
        info!(video_id = %job.video_id, "Receiving {}", file_name);

        let written = match stream_to_file(&job.source_path, field, MAX_UPLOAD_BYTES).await {
            Ok(written) => written,
            Err(e) => {
                state.packager.discard(job).await;
                return Err(e);
            }
        };
        if written == 0 {
            state.packager.discard(job).await;
            return Err(ApiError::bad_request("Uploaded video is empty"));
        }

        let handle = state.packager.spawn(job);
        return Ok(Json(ApiResponse::ok(
            "HLS video will be processed and uploaded shortly",
            handle.predicted,
        )));
    }

    Err(ApiError::bad_request("No video file provided"))
}

pub async fn delete_video<S, T>(
    State(state): State<AppState<S, T>>,
    UrlPath(video_id): UrlPath<String>,
) -> Result<Json<ApiResponse<()>>, ApiError>
where
    S: StoragePort + 'static,
    T: Transcoder + 'static,
{
    state.deletion.delete(&video_id).await?;
    Ok(Json(ApiResponse::message("Video deleted successfully")))
}

pub async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Page not found")
}

/// Save a `Stream` to a file, failing once more than `limit` bytes arrive.
/// Returns the number of bytes written.
pub async fn stream_to_file<S, E>(path: &Path, stream: S, limit: u64) -> Result<u64, ApiError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let written = async {
        let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
        let body_reader = StreamReader::new(body_with_io_error);
        futures::pin_mut!(body_reader);
        let mut limited = body_reader.take(limit + 1);

        let mut file = BufWriter::new(File::create(path).await?);
        let written = tokio::io::copy(&mut limited, &mut file).await?;
        file.flush().await?;

        Ok::<_, io::Error>(written)
    }
    .await
    .map_err(|err| ApiError::from(PipelineError::fs(path)(err)))?;

    if written > limit {
        return Err(ApiError::payload_too_large(limit));
    }
    Ok(written)
}
