use crate::domain::layout::RemoteLayout;
use crate::error::PipelineError;
use crate::ports::storage::{ObjectKind, StoragePort};
use tracing::info;
use uuid::Uuid;

/// Removes a published package from remote storage.
pub struct DeletionService<S> {
    storage: S,
    layout: RemoteLayout,
}

impl<S: StoragePort> DeletionService<S> {
    pub fn new(storage: S, layout: RemoteLayout) -> Self {
        Self { storage, layout }
    }

    /// Deletes playlists, then segments, then the job folder. Each step
    /// starts only after the previous one succeeded. Deleting a package that
    /// is already gone succeeds.
    pub async fn delete(&self, video_id: &str) -> Result<(), PipelineError> {
        let id = Uuid::parse_str(video_id.trim())
            .map_err(|_| PipelineError::Validation(format!("Invalid video id: {}", video_id)))?;
        let prefix = self.layout.job_prefix(&id);

        for kind in [ObjectKind::Playlist, ObjectKind::Segment] {
            self.storage
                .delete_prefix(&prefix, kind)
                .await
                .map_err(|source| PipelineError::Delete {
                    target: format!("{} under {}", kind, prefix),
                    source,
                })?;
        }

        self.storage
            .delete_folder(&prefix)
            .await
            .map_err(|source| PipelineError::Delete {
                target: format!("folder {}", prefix),
                source,
            })?;

        info!(video_id = %id, "Deleted package {}", prefix);
        Ok(())
    }
}
