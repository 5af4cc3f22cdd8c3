use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::path::Path;

/// Kind of remote object. Decides the object's extension and content type,
/// and lets deletion target one kind at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Playlist,
    Segment,
}

impl ObjectKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ObjectKind::Playlist => ".m3u8",
            ObjectKind::Segment => ".ts",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ObjectKind::Playlist => "application/vnd.apple.mpegurl",
            ObjectKind::Segment => "video/mp2t",
        }
    }

    /// Name of the stored object for `key`.
    pub fn object_name(&self, key: &str) -> String {
        format!("{}{}", key, self.extension())
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Playlist => write!(f, "playlists"),
            ObjectKind::Segment => write!(f, "segments"),
        }
    }
}

/// Public address of the object stored under `key`.
pub fn object_address(base_url: &str, key: &str, kind: ObjectKind) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), kind.object_name(key))
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Upload a file from a local path to storage, overwriting any previous
    /// object. Returns the object's public address.
    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        kind: ObjectKind,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;

    /// Remove every object of `kind` under `prefix`. Succeeds when nothing
    /// matches.
    async fn delete_prefix(
        &self,
        prefix: &str,
        kind: ObjectKind,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Remove the folder `prefix` once it holds no objects. Succeeds when
    /// the folder does not exist.
    async fn delete_folder(&self, prefix: &str) -> Result<(), Box<dyn Error + Send + Sync>>;
}
