//! Concurrent upload of one variant's segments.

use crate::domain::hls::SEGMENT_SUFFIX;
use crate::domain::layout::RemoteLayout;
use crate::error::PipelineError;
use crate::ports::storage::{ObjectKind, StoragePort};
use futures::future::try_join_all;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Segment files of a variant directory, sorted by name.
pub async fn list_segments(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(PipelineError::fs(dir))?;

    let mut segments = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(PipelineError::fs(dir))? {
        let is_segment = entry.file_name().to_string_lossy().ends_with(SEGMENT_SUFFIX);
        if is_segment && entry.file_type().await.map_err(PipelineError::fs(dir))?.is_file() {
            segments.push(entry.path());
        }
    }
    segments.sort();
    Ok(segments)
}

/// Uploads a single object, giving up after `timeout` when one is set.
pub async fn upload_object<S>(
    storage: &S,
    path: &Path,
    key: &str,
    kind: ObjectKind,
    timeout: Option<Duration>,
) -> Result<String, PipelineError>
where
    S: StoragePort + ?Sized,
{
    let upload = storage.upload(path, key, kind);
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, upload).await {
            Ok(result) => result,
            Err(elapsed) => Err(elapsed.into()),
        },
        None => upload.await,
    };
    result.map_err(|source| PipelineError::Upload {
        key: key.to_string(),
        source,
    })
}

/// Uploads every segment at once and waits for all of them. Returns the
/// local file name to remote address mapping, or the first failure; a
/// partial mapping is never returned.
pub async fn upload_all<S>(
    storage: &S,
    segment_paths: &[PathBuf],
    remote_folder: &str,
    timeout: Option<Duration>,
) -> Result<HashMap<String, String>, PipelineError>
where
    S: StoragePort + ?Sized,
{
    let uploads = segment_paths.iter().map(|path| async move {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::fs(path)(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "segment name is not valid UTF-8",
                ))
            })?;
        let key = RemoteLayout::segment_key(remote_folder, &name);
        let address = upload_object(storage, path, &key, ObjectKind::Segment, timeout).await?;

        debug!("Uploaded {} to {}", name, address);
        Ok::<_, PipelineError>((name, address))
    });

    let uploaded = try_join_all(uploads).await?;
    Ok(uploaded.into_iter().collect())
}
