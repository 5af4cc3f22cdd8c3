//! Process configuration, read once at startup.

use crate::error::ConfigError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where finished packages are pushed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    /// Local directory served under `public_base_url`.
    Fs { root: PathBuf },
    /// S3 bucket; credentials and region come from the AWS environment.
    S3 { bucket: String },
}

/// Settings of the external encoder.
#[derive(Clone, Debug)]
pub struct FfmpegConfig {
    /// Binary to invoke
    pub binary: PathBuf,
    /// x264 preset
    pub preset: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            preset: String::from("fast"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: u16,
    /// Shared root of the per-job workspaces
    pub temp_dir: PathBuf,
    /// Remote folder every job prefix lives under
    pub storage_folder: String,
    /// Base of every remote address handed to clients
    pub public_base_url: String,
    pub storage: StorageBackend,
    pub ffmpeg: FfmpegConfig,
    pub encode_timeout: Option<Duration>,
    pub upload_timeout: Option<Duration>,
    /// Allowed CORS origin; any origin when unset
    pub frontend_url: Option<String>,
}

impl Config {
    /// Load configuration from `.env` and environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let addr = env::var("ADDR").unwrap_or_else(|_| String::from("127.0.0.1"));
        let port: u16 = parse_var("PORT")?.unwrap_or(3500);

        let storage = match var("STORAGE_BACKEND").as_deref() {
            None | Some("fs") => StorageBackend::Fs {
                root: var("STORAGE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./public/media")),
            },
            Some("s3") => StorageBackend::S3 {
                bucket: var("S3_BUCKET").ok_or(ConfigError::Missing("S3_BUCKET"))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let public_base_url =
            var("PUBLIC_BASE_URL").unwrap_or_else(|| format!("http://{}:{}/media", addr, port));

        let defaults = FfmpegConfig::default();
        let ffmpeg = FfmpegConfig {
            binary: var("FFMPEG_PATH").map(PathBuf::from).unwrap_or(defaults.binary),
            preset: var("FFMPEG_PRESET").unwrap_or(defaults.preset),
        };

        Ok(Self {
            addr,
            port,
            temp_dir: var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./public/temp")),
            storage_folder: var("STORAGE_FOLDER").unwrap_or_else(|| String::from("hls-videos")),
            public_base_url,
            storage,
            ffmpeg,
            encode_timeout: parse_var::<u64>("ENCODE_TIMEOUT_SECS")?.map(Duration::from_secs),
            upload_timeout: parse_var::<u64>("UPLOAD_TIMEOUT_SECS")?.map(Duration::from_secs),
            frontend_url: var("FRONTEND_URL"),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

/// Non-empty value of an environment variable.
fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(None),
    }
}
