//! The fixed rendition ladder offered for every upload.

/// Target segment duration in seconds.
pub const SEGMENT_SECONDS: u32 = 6;

/// Keyframe interval in frames. Fixed so segment boundaries do not depend on
/// scene cuts in the source.
pub const GOP_SIZE: u32 = 180;

/// One rendition of the source video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Position in the ladder, also the `stream_{index}` directory suffix.
    pub index: usize,
    /// Label used in client responses ("360p", ...).
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    /// `BANDWIDTH` advertised in the master playlist.
    pub bandwidth: u64,
    /// `CODECS` advertised in the master playlist.
    pub codecs: &'static str,
}

impl Variant {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn dir_name(&self) -> String {
        format!("stream_{}", self.index)
    }
}

/// Ordered set of variants, ascending quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ladder {
    variants: [Variant; 3],
}

impl Ladder {
    pub fn standard() -> Self {
        Self {
            variants: [
                Variant {
                    index: 0,
                    name: "360p",
                    width: 640,
                    height: 360,
                    video_bitrate_kbps: 800,
                    audio_bitrate_kbps: 128,
                    bandwidth: 800_000,
                    codecs: "avc1.64001e,mp4a.40.2",
                },
                Variant {
                    index: 1,
                    name: "480p",
                    width: 854,
                    height: 480,
                    video_bitrate_kbps: 1200,
                    audio_bitrate_kbps: 128,
                    bandwidth: 1_200_000,
                    codecs: "avc1.64001f,mp4a.40.2",
                },
                Variant {
                    index: 2,
                    name: "720p",
                    width: 1280,
                    height: 720,
                    video_bitrate_kbps: 2200,
                    audio_bitrate_kbps: 128,
                    bandwidth: 2_200_000,
                    codecs: "avc1.64001f,mp4a.40.2",
                },
            ],
        }
    }

    pub fn variants(&self) -> &[Variant; 3] {
        &self.variants
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variant> {
        self.variants.iter()
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.variants.len()
    }
}

impl Default for Ladder {
    fn default() -> Self {
        Self::standard()
    }
}

impl<'a> IntoIterator for &'a Ladder {
    type Item = &'a Variant;
    type IntoIter = std::slice::Iter<'a, Variant>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
