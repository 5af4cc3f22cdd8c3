use crate::ports::storage::{object_address, ObjectKind, StoragePort};
use async_trait::async_trait;
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Object storage backed by a local directory that is served under
/// `public_base_url`.
#[derive(Clone, Debug)]
pub struct FsAdapter {
    root: PathBuf,
    public_base_url: String,
}

impl FsAdapter {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, io::Error> {
        if relative.split('/').any(|part| part == "..") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid key {:?}", relative),
            ));
        }
        Ok(self.root.join(relative.trim_start_matches('/')))
    }
}

#[async_trait]
impl StoragePort for FsAdapter {
    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        kind: ObjectKind,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let destination = self.resolve(&kind.object_name(key))?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &destination).await?;
        Ok(object_address(&self.public_base_url, key, kind))
    }

    async fn delete_prefix(
        &self,
        prefix: &str,
        kind: ObjectKind,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let folder = self.resolve(prefix)?;
        let extension = kind.extension();

        tokio::task::spawn_blocking(move || -> Result<(), io::Error> {
            if !folder.exists() {
                return Ok(());
            }
            for entry in WalkDir::new(&folder) {
                let entry = entry.map_err(io::Error::from)?;
                let matches = entry.file_type().is_file()
                    && entry.file_name().to_string_lossy().ends_with(extension);
                if matches {
                    match std::fs::remove_file(entry.path()) {
                        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                        _ => {}
                    }
                }
            }
            Ok(())
        })
        .await??;
        Ok(())
    }

    async fn delete_folder(&self, prefix: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let folder = self.resolve(prefix)?;

        tokio::task::spawn_blocking(move || -> Result<(), io::Error> {
            if !folder.exists() {
                return Ok(());
            }
            // Children first, so nested empty directories go before their parents.
            for entry in WalkDir::new(&folder).contents_first(true) {
                let entry = entry.map_err(io::Error::from)?;
                if entry.file_type().is_dir() {
                    std::fs::remove_dir(entry.path()).map_err(|e| {
                        io::Error::new(
                            e.kind(),
                            format!("folder {} is not empty: {}", entry.path().display(), e),
                        )
                    })?;
                } else {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        format!("folder still holds {}", entry.path().display()),
                    ));
                }
            }
            Ok(())
        })
        .await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn local_file(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, body).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_upload_returns_public_address() {
        let work = tempdir().unwrap();
        let remote = tempdir().unwrap();
        let adapter = FsAdapter::new(remote.path(), "http://localhost:3500/media");
        let file = local_file(work.path(), "segment_000.ts", "ts-bytes").await;

        let address = adapter
            .upload(&file, "videos/abc/stream_0/segment_000", ObjectKind::Segment)
            .await
            .unwrap();

        assert_eq!(
            address,
            "http://localhost:3500/media/videos/abc/stream_0/segment_000.ts"
        );
        let stored = remote.path().join("videos/abc/stream_0/segment_000.ts");
        assert_eq!(tokio::fs::read_to_string(stored).await.unwrap(), "ts-bytes");
    }

    #[tokio::test]
    async fn test_upload_rejects_parent_components() {
        let work = tempdir().unwrap();
        let remote = tempdir().unwrap();
        let adapter = FsAdapter::new(remote.path(), "http://localhost");
        let file = local_file(work.path(), "x.m3u8", "#EXTM3U").await;

        let result = adapter
            .upload(&file, "videos/../../etc/index", ObjectKind::Playlist)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_by_kind_then_folder() {
        let work = tempdir().unwrap();
        let remote = tempdir().unwrap();
        let adapter = FsAdapter::new(remote.path(), "http://localhost");
        let segment = local_file(work.path(), "segment_000.ts", "ts").await;
        let playlist = local_file(work.path(), "index.m3u8", "#EXTM3U").await;

        adapter
            .upload(&segment, "videos/abc/stream_0/segment_000", ObjectKind::Segment)
            .await
            .unwrap();
        adapter
            .upload(&playlist, "videos/abc/stream_0/index", ObjectKind::Playlist)
            .await
            .unwrap();
        adapter
            .upload(&playlist, "videos/abc/master", ObjectKind::Playlist)
            .await
            .unwrap();

        // Segments are still there, so the folder cannot go yet.
        adapter
            .delete_prefix("videos/abc", ObjectKind::Playlist)
            .await
            .unwrap();
        assert!(adapter.delete_folder("videos/abc").await.is_err());

        adapter
            .delete_prefix("videos/abc", ObjectKind::Segment)
            .await
            .unwrap();
        adapter.delete_folder("videos/abc").await.unwrap();

        assert!(!remote.path().join("videos/abc").exists());
        assert!(remote.path().join("videos").exists());
    }

    #[tokio::test]
    async fn test_delete_missing_prefix_is_noop() {
        let remote = tempdir().unwrap();
        let adapter = FsAdapter::new(remote.path(), "http://localhost");

        adapter
            .delete_prefix("videos/never-uploaded", ObjectKind::Segment)
            .await
            .unwrap();
        adapter.delete_folder("videos/never-uploaded").await.unwrap();
    }
}
