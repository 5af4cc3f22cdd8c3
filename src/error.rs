//! Error types shared by the pipeline layers.

use std::error::Error as StdError;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },
    #[error("encoder exited with {status}: {stderr_tail}")]
    Exited {
        status: ExitStatus,
        stderr_tail: String,
    },
    #[error("encoder stream error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoder did not finish within {0:?}")]
    TimedOut(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("encoding failed: {0}")]
    Encoding(#[from] EncodeError),
    #[error("upload of {key} failed: {source}")]
    Upload { key: String, source: BoxError },
    #[error("deletion of {target} failed: {source}")]
    Delete { target: String, source: BoxError },
    #[error("job task aborted: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn fs(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| PipelineError::Filesystem { path, source }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::Validation(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("{0} must be set")]
    Missing(&'static str),
}
