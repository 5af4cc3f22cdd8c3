use crate::domain::ladder::{Ladder, Variant};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// File suffix of the media segments the encoder writes.
pub const SEGMENT_SUFFIX: &str = ".ts";

/// Splits playlist text into lines without touching their bytes, so that
/// `join_lines(split_lines(s)) == s`.
pub fn split_lines(content: &str) -> Vec<&str> {
    content.split('\n').collect()
}

pub fn join_lines<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .map(|line| line.as_ref())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn is_segment_reference(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.starts_with('#') && trimmed.ends_with(SEGMENT_SUFFIX)
}

/// Replaces every line whose trimmed text is a key of `address_of` with the
/// mapped address. All other lines are kept as they are, so the output has
/// exactly as many lines as the input, in the same order.
pub fn rewrite<S: AsRef<str>>(lines: &[S], address_of: &HashMap<String, String>) -> Vec<String> {
    lines
        .iter()
        .map(|line| {
            let line = line.as_ref();
            match address_of.get(line.trim()) {
                Some(address) => address.clone(),
                None => line.to_string(),
            }
        })
        .collect()
}

/// Segment references that `rewrite` would leave pointing at local files.
pub fn unresolved_references<S: AsRef<str>>(
    lines: &[S],
    address_of: &HashMap<String, String>,
) -> Vec<String> {
    lines
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|line| is_segment_reference(line) && !address_of.contains_key(*line))
        .map(str::to_string)
        .collect()
}

pub struct VariantStream {
    pub bandwidth: u64,
    pub resolution: String,
    pub codecs: &'static str,
    pub uri: String,
}

/// Top-level playlist pointing at one playlist per ladder tier.
pub struct MasterPlaylist {
    pub version: u8,
    pub streams: Vec<VariantStream>,
}

impl MasterPlaylist {
    /// `uris` are the remote variant playlist addresses, indexed by ladder
    /// position. The streams are always emitted in ladder order.
    pub fn build(ladder: &Ladder, uris: &[String; 3]) -> Self {
        let streams = ladder
            .iter()
            .map(|variant: &Variant| VariantStream {
                bandwidth: variant.bandwidth,
                resolution: variant.resolution(),
                codecs: variant.codecs,
                uri: uris[variant.index].clone(),
            })
            .collect();

        Self {
            version: 3,
            streams,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("#EXTM3U\n");
        out.push_str(&format!("#EXT-X-VERSION:{}\n", self.version));
        for stream in &self.streams {
            out.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={},CODECS=\"{}\"\n",
                stream.bandwidth, stream.resolution, stream.codecs
            ));
            out.push_str(&stream.uri);
            out.push('\n');
        }
        out
    }

    pub async fn write_to(&self, path: &Path) -> Result<(), std::io::Error> {
        let mut file = File::create(path).await?;
        file.write_all(self.render().as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
