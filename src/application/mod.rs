//! Application layer: generic services wired over the ports.

pub mod deletion;
pub mod packager;
pub mod uploader;
pub mod workspace;
