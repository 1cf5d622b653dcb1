//! Build context for the dependency image
//!
//! The staging root doubles as the build context: it holds the `lib`
//! directory of staged artifacts and a generated `Dockerfile` that copies
//! them onto the base image.

use crate::error::{DepImageError, DepImageResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// File name of the generated build manifest
pub const MANIFEST_FILE_NAME: &str = "Dockerfile";

/// Directory (relative to the context root) holding staged dependencies
pub const LIB_DIR_NAME: &str = "lib";

/// A prepared build context
#[derive(Debug, Clone)]
pub struct BuildContext {
    root: PathBuf,
    manifest: String,
}

impl BuildContext {
    /// Write the manifest into `root` and return the context.
    ///
    /// Always rewrites the manifest so the context depends only on the
    /// current configuration.
    pub async fn prepare(root: &Path, base_image: &str, deploy_dir: &str) -> DepImageResult<Self> {
        let manifest = generate_manifest(base_image, deploy_dir);
        let manifest_path = root.join(MANIFEST_FILE_NAME);

        fs::write(&manifest_path, &manifest)
            .await
            .map_err(|e| DepImageError::io(format!("writing {}", manifest_path.display()), e))?;

        debug!("Wrote build manifest to {}", manifest_path.display());
        Ok(Self {
            root: root.to_path_buf(),
            manifest,
        })
    }

    /// Context directory handed to the builder
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE_NAME)
    }

    /// Generated manifest text
    pub fn manifest(&self) -> &str {
        &self.manifest
    }
}

/// Minimal recipe: start from the base image and copy the lib directory.
pub fn generate_manifest(base_image: &str, deploy_dir: &str) -> String {
    let lines = [
        format!("FROM {}", base_image),
        format!("COPY {} {}", LIB_DIR_NAME, deploy_dir),
    ];
    let mut manifest = lines.join("\n");
    manifest.push('\n');
    manifest
}
