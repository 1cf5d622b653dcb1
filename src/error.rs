//! Error types for depimage
//!
//! All modules use `DepImageResult<T>` as their return type.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for depimage operations
pub type DepImageResult<T> = Result<T, DepImageError>;

/// All errors that can occur while staging, fingerprinting or building
#[derive(Error, Debug)]
pub enum DepImageError {
    // Resolver errors
    #[error("Dependency resolution failed: {0}")]
    Resolution(String),

    #[error("Invalid dependency destination {destination}: {reason}")]
    InvalidDestination { destination: PathBuf, reason: String },

    // Staging errors
    #[error("Staging failed: {context}")]
    Staging {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Fingerprint errors
    #[error("Failed to fingerprint {path}")]
    Hash {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Build errors
    #[error("Image build failed: {command}, exit code: {code}\n{output}")]
    Build {
        command: String,
        code: i32,
        output: String,
    },

    #[error("Failed to launch image builder: {command}")]
    BuildLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image build timed out after {}s: {command}", .timeout.as_secs())]
    BuildTimeout { command: String, timeout: Duration },

    #[error("Image build cancelled: {0}")]
    BuildCancelled(String),

    // Cache record errors
    #[error("Failed to write cache record {path}")]
    RecordWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl DepImageError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a staging error with context
    pub fn staging(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Staging {
            context: context.into(),
            source,
        }
    }

    /// Create a build launch error
    pub fn build_launch(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::BuildLaunch {
            command: command.into(),
            source,
        }
    }

    /// Check if error is retryable
    ///
    /// The core never retries; this only tells callers whether running the
    /// same build again could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Build { .. } | Self::BuildTimeout { .. } | Self::BuildCancelled(_)
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::BuildLaunch { .. } => {
                Some("Install podman or set image.builder in depimage.toml (e.g. \"docker\")")
            }
            Self::BuildTimeout { .. } => Some("Raise image.build_timeout_secs or unset it"),
            Self::Resolution(_) => Some("Check the resolver manifest (resolver.manifest)"),
            Self::InvalidDestination { .. } => {
                Some("Destinations must be relative paths inside the lib directory")
            }
            _ => None,
        }
    }
}
