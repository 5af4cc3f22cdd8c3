use crate::domain::ladder::{Ladder, Variant};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Name of the playlist the encoder writes in each variant directory.
pub const ENCODER_PLAYLIST_NAME: &str = "prog_index.m3u8";
/// Name of the rewritten playlist written next to it before upload.
pub const REWRITTEN_PLAYLIST_NAME: &str = "modified.m3u8";
pub const MASTER_PLAYLIST_FILE: &str = "master.m3u8";

/// Lifecycle of one packaging run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Created,
    Staged,
    Encoding,
    UploadingVariant(usize),
    AssemblingMaster,
    Completed,
    Failed(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed(_))
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Created => write!(f, "created"),
            JobState::Staged => write!(f, "staged"),
            JobState::Encoding => write!(f, "encoding"),
            JobState::UploadingVariant(index) => write!(f, "uploading stream_{}", index),
            JobState::AssemblingMaster => write!(f, "assembling master"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Segment {
    pub name: String,
    pub local_path: PathBuf,
    pub remote_address: Option<String>,
}

/// Encoder output for one ladder entry.
#[derive(Debug, Clone)]
pub struct VariantOutput {
    pub variant: Variant,
    pub dir: PathBuf,
    pub manifest_path: PathBuf,
    pub segments: Vec<Segment>,
    pub remote_manifest: Option<String>,
}

impl VariantOutput {
    pub fn new(workspace: &Path, variant: &Variant) -> Self {
        let dir = workspace.join(variant.dir_name());
        Self {
            manifest_path: dir.join(ENCODER_PLAYLIST_NAME),
            dir,
            variant: variant.clone(),
            segments: Vec::new(),
            remote_manifest: None,
        }
    }
}

/// One upload being packaged. Owned by a single pipeline run.
#[derive(Debug)]
pub struct Job {
    pub video_id: Uuid,
    pub source_path: PathBuf,
    pub workspace: PathBuf,
    pub ladder: Ladder,
    pub state: JobState,
    pub variants: Vec<VariantOutput>,
    pub master_address: Option<String>,
}

impl Job {
    pub fn new(video_id: Uuid, workspace: PathBuf, source_extension: &str, ladder: Ladder) -> Self {
        let source_path = workspace.join(format!("source{}", source_extension));
        let variants = ladder
            .iter()
            .map(|variant| VariantOutput::new(&workspace, variant))
            .collect();

        Self {
            video_id,
            source_path,
            workspace,
            ladder,
            state: JobState::Created,
            variants,
            master_address: None,
        }
    }

    pub fn master_playlist_path(&self) -> PathBuf {
        self.workspace.join(MASTER_PLAYLIST_FILE)
    }

    /// Every remote address produced so far, variant playlists in ladder
    /// order followed by the master playlist.
    pub fn remote_addresses(&self) -> Vec<String> {
        self.variants
            .iter()
            .filter_map(|v| v.remote_manifest.clone())
            .chain(self.master_address.clone())
            .collect()
    }
}
