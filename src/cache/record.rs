//! Persisted fingerprint of the last successful build
//!
//! Stored as a plain-text hex digest in `dependencies.sha256` at the staging
//! root.

use crate::error::{DepImageError, DepImageResult};
use crate::fingerprint::Fingerprint;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// File name of the record inside the staging root
pub const RECORD_FILE_NAME: &str = "dependencies.sha256";

/// Handle to the on-disk cache record
#[derive(Debug, Clone)]
pub struct CacheRecord {
    path: PathBuf,
}

impl CacheRecord {
    /// Record at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Record inside a staging root
    pub fn in_root(root: &Path) -> Self {
        Self::new(root.join(RECORD_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previous fingerprint.
    ///
    /// A missing or empty file yields `None`. Unparseable content also
    /// yields `None` so the next run rebuilds and overwrites it.
    pub async fn load(&self) -> DepImageResult<Option<Fingerprint>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache record at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(DepImageError::io(
                    format!("reading cache record {}", self.path.display()),
                    e,
                ))
            }
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        match Fingerprint::from_hex(trimmed) {
            Some(fingerprint) => Ok(Some(fingerprint)),
            None => {
                warn!(
                    "Ignoring malformed cache record at {}",
                    self.path.display()
                );
                Ok(None)
            }
        }
    }

    /// Persist `fingerprint`, replacing any previous record.
    ///
    /// Writes a sibling temp file and renames it over the record, so readers
    /// see either the old or the new value.
    pub async fn store(&self, fingerprint: &Fingerprint) -> DepImageResult<()> {
        let write_err = |source| DepImageError::RecordWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, format!("{}\n", fingerprint))
            .await
            .map_err(write_err)?;
        fs::rename(&tmp, &self.path).await.map_err(write_err)?;

        debug!("Recorded fingerprint {} at {}", fingerprint, self.path.display());
        Ok(())
    }
}
