//! HLS Packager - adaptive-bitrate HLS packaging service
//!
//! Hexagonal Architecture:
//! - domain/: Pure logic (ladder, jobs, hls playlists, remote layout)
//! - ports/: Trait definitions (storage, transcoder)
//! - adapters/: Concrete implementations (ffmpeg, filesystem, S3, HTTP)
//! - application/: Generic services (workspaces, uploads, packaging, deletion)
//! - config: Environment configuration
//!
//! # Features
//! - `aws` (default): S3 storage backend

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;

pub use config::Config;
pub use error::PipelineError;
