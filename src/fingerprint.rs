//! Content fingerprints for staged dependency files
//!
//! Two kinds of fingerprint are used: a per-file fingerprint (SHA256 of the
//! file bytes) and an aggregate fingerprint over a set of files. The aggregate
//! hashes the sorted hex strings of the per-file fingerprints, so the same
//! dependency set always yields the same value regardless of resolver order.

use crate::error::{DepImageError, DepImageResult};
use futures_util::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Length of a fingerprint rendered as hex
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Lowercase hex SHA256 digest of a file or a file set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint arbitrary bytes
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Parse a hex fingerprint, e.g. one read back from a cache record.
    ///
    /// Returns `None` unless the input is exactly 64 hex digits.
    /// Uppercase input is normalized to lowercase.
    pub fn from_hex(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.len() != FINGERPRINT_HEX_LEN || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(value.to_ascii_lowercase()))
    }

    /// Hex representation
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// First `len` hex characters, for display
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fingerprint a single file's contents
pub fn file_fingerprint(path: &Path) -> DepImageResult<Fingerprint> {
    let contents = fs::read(path).map_err(|e| DepImageError::Hash {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(Fingerprint::of_bytes(&contents))
}

/// Combine per-file fingerprints into one order-independent fingerprint.
///
/// Hex strings are sorted before concatenation, so any permutation of the
/// same multiset of inputs produces the same output.
pub fn aggregate<'a, I>(fingerprints: I) -> Fingerprint
where
    I: IntoIterator<Item = &'a Fingerprint>,
{
    let mut hexes: Vec<&str> = fingerprints.into_iter().map(Fingerprint::as_hex).collect();
    hexes.sort_unstable();

    let mut hasher = Sha256::new();
    for hex in hexes {
        hasher.update(hex.as_bytes());
    }
    Fingerprint(hex::encode(hasher.finalize()))
}

/// Fingerprint many files, hashing up to `concurrency` of them at once.
///
/// Results come back in completion order, not input order; callers are
/// expected to feed them to [`aggregate`].
pub async fn fingerprint_files(
    paths: &[PathBuf],
    concurrency: usize,
) -> DepImageResult<Vec<Fingerprint>> {
    let results: Vec<DepImageResult<Fingerprint>> = stream::iter(paths.iter().cloned())
        .map(|path| async move {
            let task_path = path.clone();
            match tokio::task::spawn_blocking(move || file_fingerprint(&task_path)).await {
                Ok(result) => result,
                Err(e) => Err(DepImageError::Hash {
                    path,
                    source: std::io::Error::other(e),
                }),
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let fingerprints = results.into_iter().collect::<DepImageResult<Vec<_>>>()?;
    debug!("Fingerprinted {} files", fingerprints.len());
    Ok(fingerprints)
}
