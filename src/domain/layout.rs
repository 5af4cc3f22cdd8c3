//! Remote key and address convention:
//! `{folder}/{video_id}/stream_{i}/{name}` for variant objects and
//! `{folder}/{video_id}/master` for the master playlist.

use crate::domain::ladder::{Ladder, Variant};
use crate::ports::storage::{object_address, ObjectKind};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

pub const VARIANT_PLAYLIST_NAME: &str = "index";
pub const MASTER_PLAYLIST_NAME: &str = "master";

#[derive(Debug, Clone)]
pub struct RemoteLayout {
    base_url: String,
    folder: String,
}

/// Addresses a finished package will have, known before encoding starts.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PredictedUrls {
    pub master_url: String,
    pub variant_urls: BTreeMap<String, String>,
    pub video_id: String,
    pub video_path: String,
}

impl RemoteLayout {
    pub fn new(base_url: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            folder: folder.into().trim_matches('/').to_string(),
        }
    }

    pub fn job_prefix(&self, video_id: &Uuid) -> String {
        format!("{}/{}", self.folder, video_id)
    }

    pub fn variant_folder(&self, video_id: &Uuid, variant: &Variant) -> String {
        format!("{}/{}", self.job_prefix(video_id), variant.dir_name())
    }

    /// Key of a segment file: its name without extension, under the
    /// variant folder.
    pub fn segment_key(remote_folder: &str, segment_name: &str) -> String {
        let stem = segment_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(segment_name);
        format!("{}/{}", remote_folder, stem)
    }

    pub fn variant_playlist_key(&self, video_id: &Uuid, variant: &Variant) -> String {
        format!(
            "{}/{}",
            self.variant_folder(video_id, variant),
            VARIANT_PLAYLIST_NAME
        )
    }

    pub fn master_key(&self, video_id: &Uuid) -> String {
        format!("{}/{}", self.job_prefix(video_id), MASTER_PLAYLIST_NAME)
    }

    pub fn predict(&self, video_id: &Uuid, ladder: &Ladder) -> PredictedUrls {
        let variant_urls = ladder
            .iter()
            .map(|variant| {
                let key = self.variant_playlist_key(video_id, variant);
                (
                    variant.name.to_string(),
                    object_address(&self.base_url, &key, ObjectKind::Playlist),
                )
            })
            .collect();

        PredictedUrls {
            master_url: object_address(
                &self.base_url,
                &self.master_key(video_id),
                ObjectKind::Playlist,
            ),
            variant_urls,
            video_id: video_id.to_string(),
            video_path: self.job_prefix(video_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> Uuid {
        Uuid::parse_str("6f1c2d4e-8a9b-4c3d-9e0f-123456789abc").unwrap()
    }

    #[test]
    fn test_keys_follow_folder_convention() {
        let layout = RemoteLayout::new("https://cdn.test/media/", "/videos/");
        let ladder = Ladder::standard();
        let v = &ladder.variants()[2];

        assert_eq!(layout.job_prefix(&id()), format!("videos/{}", id()));
        assert_eq!(
            layout.variant_playlist_key(&id(), v),
            format!("videos/{}/stream_2/index", id())
        );
        assert_eq!(layout.master_key(&id()), format!("videos/{}/master", id()));
        assert_eq!(
            RemoteLayout::segment_key("videos/x/stream_0", "segment_007.ts"),
            "videos/x/stream_0/segment_007"
        );
    }

    #[test]
    fn test_predicted_urls() {
        let layout = RemoteLayout::new("https://cdn.test/media", "videos");
        let predicted = layout.predict(&id(), &Ladder::standard());

        assert_eq!(
            predicted.master_url,
            format!("https://cdn.test/media/videos/{}/master.m3u8", id())
        );
        assert_eq!(
            predicted.variant_urls["360p"],
            format!("https://cdn.test/media/videos/{}/stream_0/index.m3u8", id())
        );
        assert_eq!(
            predicted.variant_urls["720p"],
            format!("https://cdn.test/media/videos/{}/stream_2/index.m3u8", id())
        );
        assert_eq!(predicted.video_path, format!("videos/{}", id()));

        let json = serde_json::to_value(&predicted).unwrap();
        assert!(json.get("masterUrl").is_some());
        assert!(json["variantUrls"].get("480p").is_some());
    }
}
