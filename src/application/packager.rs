//! Drives one upload from its staged source file to a published HLS package.

use crate::application::uploader::{list_segments, upload_all, upload_object};
use crate::application::workspace::WorkspaceManager;
use crate::domain::hls::{join_lines, rewrite, split_lines, unresolved_references, MasterPlaylist};
use crate::domain::jobs::{Job, JobState, Segment, VariantOutput, REWRITTEN_PLAYLIST_NAME};
use crate::domain::ladder::Ladder;
use crate::domain::layout::{PredictedUrls, RemoteLayout};
use crate::error::PipelineError;
use crate::ports::storage::{ObjectKind, StoragePort};
use crate::ports::transcoder::Transcoder;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Source containers accepted for packaging.
pub const ALLOWED_EXTENSIONS: [&str; 3] = [".mp4", ".mov", ".mkv"];

/// Returns the lowercased extension (with its dot) of an uploaded file name,
/// or a validation error when the container is not accepted.
pub fn validate_source_name(file_name: &str) -> Result<String, PipelineError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()));

    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(ext),
        _ => Err(PipelineError::Validation(format!(
            "Unsupported video format. Allowed: {}",
            ALLOWED_EXTENSIONS.join(", ")
        ))),
    }
}

/// Observer side of a running job.
pub struct JobHandle {
    pub video_id: Uuid,
    pub predicted: PredictedUrls,
    state: watch::Receiver<JobState>,
    task: JoinHandle<JobState>,
}

impl JobHandle {
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.clone()
    }

    /// Resolves once the job reached a terminal state and its workspace was
    /// released.
    pub async fn wait(self) -> JobState {
        match self.task.await {
            Ok(state) => state,
            Err(e) => JobState::Failed(PipelineError::Internal(e.to_string()).to_string()),
        }
    }
}

pub struct PackagingService<S, T> {
    storage: S,
    transcoder: T,
    workspaces: WorkspaceManager,
    layout: RemoteLayout,
    ladder: Ladder,
    upload_timeout: Option<Duration>,
}

impl<S, T> PackagingService<S, T>
where
    S: StoragePort + 'static,
    T: Transcoder + 'static,
{
    pub fn new(storage: S, transcoder: T, workspaces: WorkspaceManager, layout: RemoteLayout) -> Self {
        Self {
            storage,
            transcoder,
            workspaces,
            layout,
            ladder: Ladder::standard(),
            upload_timeout: None,
        }
    }

    pub fn with_upload_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// Allocate an identifier and a fresh workspace for an accepted upload.
    /// The caller writes the source to `job.source_path`, then either
    /// [`spawn`](Self::spawn)s or [`discard`](Self::discard)s the job.
    pub async fn create_job(&self, extension: &str) -> Result<Job, PipelineError> {
        let video_id = Uuid::new_v4();
        let workspace = self.workspaces.prepare(&video_id).await?;
        let job = Job::new(video_id, workspace, extension, self.ladder.clone());
        info!(video_id = %video_id, state = %job.state, "Job created");
        Ok(job)
    }

    /// Drop a job that never started, releasing its workspace.
    pub async fn discard(&self, job: Job) {
        warn!(video_id = %job.video_id, "Discarding job before processing");
        self.workspaces.release(&job.video_id).await;
    }

    /// Start processing a staged job in the background.
    pub fn spawn(self: &Arc<Self>, mut job: Job) -> JobHandle {
        let (tx, rx) = watch::channel(JobState::Created);
        transition(&mut job, &tx, JobState::Staged);

        let video_id = job.video_id;
        let predicted = self.layout.predict(&video_id, &job.ladder);
        let service = Arc::clone(self);
        let task = tokio::spawn(async move { service.run(job, tx).await });

        JobHandle {
            video_id,
            predicted,
            state: rx,
            task,
        }
    }

    /// Run a job to a terminal state. The workspace is released afterwards
    /// whatever the outcome, including a panic inside the pipeline.
    pub async fn run(&self, mut job: Job, tx: watch::Sender<JobState>) -> JobState {
        let outcome = AssertUnwindSafe(self.execute(&mut job, &tx))
            .catch_unwind()
            .await;

        let terminal = match outcome {
            Ok(Ok(())) => JobState::Completed,
            Ok(Err(e)) => {
                error!(video_id = %job.video_id, "Packaging failed: {}", e);
                JobState::Failed(e.to_string())
            }
            Err(panic) => {
                let e = PipelineError::Internal(panic_message(panic.as_ref()));
                error!(video_id = %job.video_id, "Packaging panicked: {}", e);
                JobState::Failed(e.to_string())
            }
        };
        transition(&mut job, &tx, terminal.clone());

        self.workspaces.release(&job.video_id).await;
        terminal
    }

    async fn execute(
        &self,
        job: &mut Job,
        tx: &watch::Sender<JobState>,
    ) -> Result<(), PipelineError> {
        transition(job, tx, JobState::Encoding);
        self.transcoder
            .transcode(&job.source_path, &job.workspace, &job.ladder)
            .await?;

        // Variants go out one at a time, in ladder order.
        let mut playlist_urls = Vec::with_capacity(job.variants.len());
        for index in 0..job.variants.len() {
            transition(job, tx, JobState::UploadingVariant(index));
            let url = self
                .publish_variant(&job.video_id, &mut job.variants[index])
                .await?;
            playlist_urls.push(url);
        }

        transition(job, tx, JobState::AssemblingMaster);
        let uris: [String; 3] = playlist_urls.try_into().map_err(|urls: Vec<String>| {
            PipelineError::Internal(format!("expected 3 variant playlists, got {}", urls.len()))
        })?;
        let master = MasterPlaylist::build(&job.ladder, &uris);
        let master_path = job.master_playlist_path();
        master
            .write_to(&master_path)
            .await
            .map_err(PipelineError::fs(&master_path))?;

        let key = self.layout.master_key(&job.video_id);
        let address = upload_object(
            &self.storage,
            &master_path,
            &key,
            ObjectKind::Playlist,
            self.upload_timeout,
        )
        .await?;
        info!(video_id = %job.video_id, "Master playlist available at {}", address);
        job.master_address = Some(address);
        Ok(())
    }

    /// Upload a variant's segments, point its playlist at them and upload
    /// the rewritten playlist. Returns the playlist's remote address.
    async fn publish_variant(
        &self,
        video_id: &Uuid,
        output: &mut VariantOutput,
    ) -> Result<String, PipelineError> {
        let content = tokio::fs::read_to_string(&output.manifest_path)
            .await
            .map_err(PipelineError::fs(&output.manifest_path))?;
        let segment_paths = list_segments(&output.dir).await?;

        let remote_folder = self.layout.variant_folder(video_id, &output.variant);
        let addresses =
            upload_all(&self.storage, &segment_paths, &remote_folder, self.upload_timeout).await?;

        let lines = split_lines(&content);
        for missing in unresolved_references(&lines, &addresses) {
            warn!(
                video_id = %video_id,
                variant = output.variant.index,
                "Playlist references {} which was not uploaded",
                missing
            );
        }

        let rewritten_path = output.dir.join(REWRITTEN_PLAYLIST_NAME);
        tokio::fs::write(&rewritten_path, join_lines(&rewrite(&lines, &addresses)))
            .await
            .map_err(PipelineError::fs(&rewritten_path))?;

        let key = self.layout.variant_playlist_key(video_id, &output.variant);
        let address = upload_object(
            &self.storage,
            &rewritten_path,
            &key,
            ObjectKind::Playlist,
            self.upload_timeout,
        )
        .await?;

        output.segments = segment_paths
            .into_iter()
            .filter_map(|local_path| {
                let name = local_path.file_name()?.to_str()?.to_string();
                Some(Segment {
                    remote_address: addresses.get(&name).cloned(),
                    name,
                    local_path,
                })
            })
            .collect();
        output.remote_manifest = Some(address.clone());

        info!(
            video_id = %video_id,
            variant = output.variant.index,
            "Published {} segments and playlist {}",
            output.segments.len(),
            address
        );
        Ok(address)
    }
}

fn transition(job: &mut Job, tx: &watch::Sender<JobState>, state: JobState) {
    info!(video_id = %job.video_id, state = %state, "Job state changed");
    job.state = state.clone();
    tx.send_replace(state);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "pipeline panicked".to_string()
    }
}
