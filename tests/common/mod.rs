#![allow(dead_code)]

use async_trait::async_trait;
use hls_packager::adapters::local::FsAdapter;
use hls_packager::application::deletion::DeletionService;
use hls_packager::application::packager::PackagingService;
use hls_packager::application::workspace::WorkspaceManager;
use hls_packager::domain::jobs::ENCODER_PLAYLIST_NAME;
use hls_packager::domain::ladder::Ladder;
use hls_packager::domain::layout::RemoteLayout;
use hls_packager::error::EncodeError;
use hls_packager::ports::storage::{ObjectKind, StoragePort};
use hls_packager::ports::transcoder::Transcoder;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

pub const BASE_URL: &str = "http://media.test/media";
pub const FOLDER: &str = "hls-videos";

/// Writes what the encoder would: one directory per variant holding a VOD
/// playlist and its segments.
pub struct FakeTranscoder {
    pub segments_per_variant: usize,
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(
        &self,
        source: &Path,
        output_root: &Path,
        ladder: &Ladder,
    ) -> Result<(), EncodeError> {
        tokio::fs::metadata(source).await?;

        for variant in ladder {
            let dir = output_root.join(variant.dir_name());
            tokio::fs::create_dir_all(&dir).await?;

            let mut playlist = String::from(
                "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n#EXT-X-MEDIA-SEQUENCE:0\n#EXT-X-PLAYLIST-TYPE:VOD\n",
            );
            for i in 0..self.segments_per_variant {
                let name = format!("segment_{:03}.ts", i);
                tokio::fs::write(dir.join(&name), format!("{}-{}", variant.name, i)).await?;
                playlist.push_str(&format!("#EXTINF:6.000000,\n{}\n", name));
            }
            playlist.push_str("#EXT-X-ENDLIST\n");
            tokio::fs::write(dir.join(ENCODER_PLAYLIST_NAME), playlist).await?;
        }
        Ok(())
    }
}

/// Filesystem storage that refuses uploads whose key contains `poison`.
#[derive(Clone)]
pub struct FlakyStorage {
    pub inner: FsAdapter,
    pub poison: &'static str,
}

#[async_trait]
impl StoragePort for FlakyStorage {
    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        kind: ObjectKind,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        if key.contains(self.poison) {
            return Err(format!("refusing {}", key).into());
        }
        self.inner.upload(local_path, key, kind).await
    }

    async fn delete_prefix(
        &self,
        prefix: &str,
        kind: ObjectKind,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.inner.delete_prefix(prefix, kind).await
    }

    async fn delete_folder(&self, prefix: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.inner.delete_folder(prefix).await
    }
}

pub fn layout() -> RemoteLayout {
    RemoteLayout::new(BASE_URL, FOLDER)
}

pub fn packager<S, T>(temp_root: &Path, storage: S, transcoder: T) -> Arc<PackagingService<S, T>>
where
    S: StoragePort + 'static,
    T: Transcoder + 'static,
{
    Arc::new(PackagingService::new(
        storage,
        transcoder,
        WorkspaceManager::new(temp_root),
        layout(),
    ))
}

pub fn deletion<S: StoragePort>(storage: S) -> Arc<DeletionService<S>> {
    Arc::new(DeletionService::new(storage, layout()))
}

/// Local file a public address of the filesystem storage maps to.
pub fn stored_path(storage_root: &Path, address: &str) -> std::path::PathBuf {
    let relative = address
        .strip_prefix(BASE_URL)
        .unwrap_or(address)
        .trim_start_matches('/');
    storage_root.join(relative)
}

pub async fn entries(dir: &Path) -> Vec<String> {
    let mut out = Vec::new();
    let mut read = match tokio::fs::read_dir(dir).await {
        Ok(read) => read,
        Err(_) => return out,
    };
    while let Some(entry) = read.next_entry().await.unwrap() {
        out.push(entry.file_name().to_string_lossy().into_owned());
    }
    out.sort();
    out
}
