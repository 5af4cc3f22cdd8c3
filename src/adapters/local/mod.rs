//! Local adapters: filesystem object storage and the ffmpeg encoder.

pub mod ffmpeg;
pub mod fs;

pub use ffmpeg::FfmpegTranscoder;
pub use fs::FsAdapter;
