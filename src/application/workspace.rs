//! Per-job scratch directories under a shared temp root.

use crate::error::PipelineError;
use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Marker file that always survives a sweep of the temp root.
pub const SENTINEL: &str = ".gitkeep";

/// Owns the shared temp root. Each job gets `{root}/{job_id}`; the sweep
/// removes everything else except the sentinel and workspaces of jobs still
/// running in this process.
#[derive(Clone, Debug)]
pub struct WorkspaceManager {
    root: PathBuf,
    live: Arc<Mutex<HashSet<String>>>,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            live: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Sweep residue of earlier runs, then create the job's directory.
    pub async fn prepare(&self, job_id: &Uuid) -> Result<PathBuf, PipelineError> {
        let name = job_id.to_string();
        self.live_set().insert(name.clone());

        let result = self.create(&name).await;
        if result.is_err() {
            self.live_set().remove(&name);
        }
        result
    }

    async fn create(&self, name: &str) -> Result<PathBuf, PipelineError> {
        if let Err(e) = self.clean().await {
            error!("Pre-job sweep of {} failed: {}", self.root.display(), e);
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(PipelineError::fs(&self.root))?;
        let sentinel = self.root.join(SENTINEL);
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&sentinel)
            .await
            .map_err(PipelineError::fs(&sentinel))?;

        let dir = self.root.join(name);
        tokio::fs::create_dir(&dir)
            .await
            .map_err(PipelineError::fs(&dir))?;
        debug!("Workspace created at {}", dir.display());
        Ok(dir)
    }

    /// Remove every entry of the root except the sentinel and live
    /// workspaces. A missing root is not an error. Every entry is attempted;
    /// the first failure is returned once the sweep is done. Returns how
    /// many entries were removed.
    pub async fn clean(&self) -> Result<usize, PipelineError> {
        self.sweep(remove_entry).await
    }

    async fn sweep<F, Fut>(&self, remove: F) -> Result<usize, PipelineError>
    where
        F: Fn(PathBuf) -> Fut,
        Fut: Future<Output = io::Result<()>>,
    {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(PipelineError::fs(&self.root)(e)),
        };

        let mut removed = 0;
        let mut first_error = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(PipelineError::fs(&self.root))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == SENTINEL || self.live_set().contains(&name) {
                continue;
            }

            let path = entry.path();
            match remove(path.clone()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Could not remove {}: {}", path.display(), e);
                    if first_error.is_none() {
                        first_error = Some(PipelineError::fs(path)(e));
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Give up the job's workspace and sweep the root. Failures are logged,
    /// never returned.
    pub async fn release(&self, job_id: &Uuid) {
        self.release_with(job_id, remove_entry).await
    }

    async fn release_with<F, Fut>(&self, job_id: &Uuid, remove: F)
    where
        F: Fn(PathBuf) -> Fut,
        Fut: Future<Output = io::Result<()>>,
    {
        let name = job_id.to_string();
        self.live_set().remove(&name);

        // The job's own directory goes first, independent of the sweep.
        let dir = self.root.join(&name);
        match remove(dir.clone()).await {
            Ok(()) => debug!("Removed workspace {}", dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!("Could not remove workspace {}: {}", dir.display(), e),
        }

        match self.sweep(&remove).await {
            Ok(removed) => debug!("Cleaned {} entries from {}", removed, self.root.display()),
            Err(e) => error!("Workspace cleanup for {} failed: {}", job_id, e),
        }
    }

    fn live_set(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn remove_entry(path: PathBuf) -> io::Result<()> {
    let metadata = tokio::fs::symlink_metadata(&path).await?;
    if metadata.is_dir() {
        tokio::fs::remove_dir_all(&path).await
    } else {
        tokio::fs::remove_file(&path).await
    }
}
