//! depimage - cached dependency base images
//!
//! Stages a project's resolved runtime dependencies into a directory,
//! fingerprints the set and builds a base image only when the fingerprint
//! differs from the one recorded after the last successful build.

pub mod builder;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod pipeline;
pub mod resolve;
pub mod stage;
pub mod ui;

pub use error::{DepImageError, DepImageResult};
pub use fingerprint::Fingerprint;
pub use pipeline::{BuildOutcome, DependencyImage, PipelineSettings};
