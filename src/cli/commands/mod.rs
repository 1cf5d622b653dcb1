//! CLI command implementations

pub mod build;
pub mod clean;
pub mod config;
pub mod status;

pub use build::execute as build;
pub use clean::execute as clean;
pub use config::execute as config;
pub use status::execute as status;

use crate::config::Config;
use crate::resolve::ManifestResolver;
use std::path::PathBuf;

/// Resolver for the command, honoring a `--manifest` override
fn manifest_resolver(config: &Config, manifest: Option<PathBuf>) -> ManifestResolver {
    ManifestResolver::new(manifest.unwrap_or_else(|| config.resolver.manifest.clone()))
}
