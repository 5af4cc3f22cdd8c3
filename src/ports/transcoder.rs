use crate::domain::ladder::Ladder;
use crate::error::EncodeError;
use async_trait::async_trait;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Encode `source` into one `stream_{index}` directory per ladder entry
    /// under `output_root`, each holding `prog_index.m3u8` and its
    /// `segment_%03d.ts` files. Resolves once the encoder has exited.
    async fn transcode(
        &self,
        source: &Path,
        output_root: &Path,
        ladder: &Ladder,
    ) -> Result<(), EncodeError>;
}
