//! Dependency resolution
//!
//! The resolver itself lives outside this crate (a build tool, a lockfile
//! walker, ...). depimage only needs the list of artifacts to stage, each as
//! a source file plus a destination path relative to the `lib` directory.
//!
//! Two resolvers are provided:
//! 1. `ManifestResolver`: reads a TOML file written by the build tool
//! 2. `StaticResolver`: an in-memory list (embedding, tests)

use crate::error::{DepImageError, DepImageResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One resolved dependency artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    /// File to copy
    pub source: PathBuf,

    /// Path relative to the staging `lib` directory
    pub destination: PathBuf,
}

impl DependencyEntry {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// Source of the dependency set for one run
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    /// Resolve the current dependency set.
    ///
    /// Errors are fatal for the run and are not retried.
    async fn resolve(&self) -> DepImageResult<Vec<DependencyEntry>>;
}

/// Resolver backed by a fixed list of entries
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: Vec<DependencyEntry>,
}

impl StaticResolver {
    pub fn new(entries: Vec<DependencyEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl DependencyResolver for StaticResolver {
    async fn resolve(&self) -> DepImageResult<Vec<DependencyEntry>> {
        Ok(self.entries.clone())
    }
}

/// On-disk manifest format
///
/// ```toml
/// [[dependency]]
/// source = "/home/me/.ivy2/cache/a.jar"
/// destination = "a.jar"
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
struct DependencyManifest {
    #[serde(default, rename = "dependency")]
    dependencies: Vec<DependencyEntry>,
}

/// Resolver that reads a TOML dependency manifest.
///
/// Relative `source` paths are resolved against the manifest's directory.
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    path: PathBuf,
}

impl ManifestResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse manifest content, anchoring relative sources at `base_dir`
    pub fn parse(content: &str, base_dir: &Path) -> DepImageResult<Vec<DependencyEntry>> {
        let manifest: DependencyManifest =
            toml::from_str(content).map_err(|e| DepImageError::Resolution(e.to_string()))?;

        Ok(manifest
            .dependencies
            .into_iter()
            .map(|entry| DependencyEntry {
                source: if entry.source.is_absolute() {
                    entry.source
                } else {
                    base_dir.join(entry.source)
                },
                destination: entry.destination,
            })
            .collect())
    }
}

#[async_trait]
impl DependencyResolver for ManifestResolver {
    async fn resolve(&self) -> DepImageResult<Vec<DependencyEntry>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DepImageError::Resolution(format!(
                "reading dependency manifest {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let base_dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let entries = Self::parse(&content, base_dir)?;
        debug!(
            "Resolved {} dependencies from {}",
            entries.len(),
            self.path.display()
        );
        Ok(entries)
    }
}
