//! Ports - Trait definitions for the pipeline's external collaborators.

pub mod storage;
pub mod transcoder;
