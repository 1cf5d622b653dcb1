//! Configuration schema for depimage
//!
//! Project configuration lives in `depimage.toml`; user-wide defaults in
//! `~/.config/depimage/config.toml`.

use crate::error::{DepImageError, DepImageResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Dependency image settings
    pub image: ImageConfig,

    /// Staging directory settings
    pub staging: StagingConfig,

    /// Dependency resolver settings
    pub resolver: ResolverConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Dependency image configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Stable image name, without a tag
    pub name: String,

    /// Base image the dependencies are layered onto
    pub base: String,

    /// Directory inside the image receiving the staged `lib` directory
    pub deploy_dir: String,

    /// Container CLI used to build ("podman" or "docker")
    pub builder: String,

    /// Kill the build after this many seconds (unset = no limit)
    pub build_timeout_secs: Option<u64>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            name: "dependencies".to_string(),
            base: "eclipse-temurin:21-jre".to_string(),
            deploy_dir: "/local/deploy/lib".to_string(),
            builder: "podman".to_string(),
            build_timeout_secs: None,
        }
    }
}

/// Staging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Staging root; relative paths resolve against the project directory
    pub root: PathBuf,

    /// Files hashed concurrently (unset = available parallelism)
    pub hash_concurrency: Option<usize>,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("target/depimage"),
            hash_concurrency: None,
        }
    }
}

/// Resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Dependency manifest written by the build tool
    pub manifest: PathBuf,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("dependencies.toml"),
        }
    }
}

impl Config {
    /// Build timeout as a duration
    pub fn build_timeout(&self) -> Option<Duration> {
        self.image.build_timeout_secs.map(Duration::from_secs)
    }

    /// Effective hashing concurrency
    pub fn hash_concurrency(&self) -> usize {
        self.staging.hash_concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Make relative paths absolute against `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.staging.root.is_relative() {
            self.staging.root = base.join(&self.staging.root);
        }
        if self.resolver.manifest.is_relative() {
            self.resolver.manifest = base.join(&self.resolver.manifest);
        }
    }

    /// Check values serde cannot express. `source` is used in errors.
    pub fn validate(&self, source: &Path) -> DepImageResult<()> {
        let invalid = |reason: String| DepImageError::ConfigInvalid {
            path: source.to_path_buf(),
            reason,
        };

        let name = self.image.name.trim();
        if name.is_empty() {
            return Err(invalid("image.name must not be empty".to_string()));
        }
        // the fingerprint becomes the tag, so the name itself must be untagged
        let last_segment = name.rsplit('/').next().unwrap_or(name);
        if last_segment.contains(':') || name.contains('@') {
            return Err(invalid(format!(
                "image.name '{}' must not include a tag or digest",
                name
            )));
        }
        if self.image.base.trim().is_empty() {
            return Err(invalid("image.base must not be empty".to_string()));
        }
        if self.image.builder.trim().is_empty() {
            return Err(invalid("image.builder must not be empty".to_string()));
        }
        if !self.image.deploy_dir.starts_with('/') {
            return Err(invalid(format!(
                "image.deploy_dir '{}' must be an absolute path",
                self.image.deploy_dir
            )));
        }
        if self.image.build_timeout_secs == Some(0) {
            return Err(invalid(
                "image.build_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.staging.hash_concurrency == Some(0) {
            return Err(invalid(
                "staging.hash_concurrency must be at least 1".to_string(),
            ));
        }
        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            return Err(invalid(format!(
                "general.log_format '{}' must be \"text\" or \"json\"",
                self.general.log_format
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[image]"));
        assert!(toml.contains("[staging]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.image.name, "dependencies");
        assert_eq!(config.image.deploy_dir, "/local/deploy/lib");
        assert!(config.build_timeout().is_none());
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [image]
            name = "registry.local:5000/myapp-deps"
            build_timeout_secs = 600
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.image.name, "registry.local:5000/myapp-deps");
        assert_eq!(config.build_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(config.image.builder, "podman"); // default preserved
        assert!(config.validate(Path::new("depimage.toml")).is_ok());
    }

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate(Path::new("x")).is_ok());
    }

    #[test]
    fn validate_rejects_tagged_name() {
        let mut config = Config::default();
        config.image.name = "myapp-deps:latest".to_string();
        let err = config.validate(Path::new("depimage.toml")).unwrap_err();
        assert!(err.to_string().contains("must not include a tag"));

        config.image.name = "myapp@sha256:abc".to_string();
        assert!(config.validate(Path::new("depimage.toml")).is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config::default();
        config.image.deploy_dir = "relative/lib".to_string();
        assert!(config.validate(Path::new("x")).is_err());

        let mut config = Config::default();
        config.staging.hash_concurrency = Some(0);
        assert!(config.validate(Path::new("x")).is_err());

        let mut config = Config::default();
        config.image.build_timeout_secs = Some(0);
        assert!(config.validate(Path::new("x")).is_err());

        let mut config = Config::default();
        config.general.log_format = "xml".to_string();
        assert!(config.validate(Path::new("x")).is_err());
    }

    #[test]
    fn resolve_paths_anchors_relative() {
        let mut config = Config::default();
        config.resolver.manifest = PathBuf::from("/abs/deps.toml");
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.staging.root, PathBuf::from("/project/target/depimage"));
        assert_eq!(config.resolver.manifest, PathBuf::from("/abs/deps.toml"));
    }

    #[test]
    fn hash_concurrency_defaults_to_at_least_one() {
        assert!(Config::default().hash_concurrency() >= 1);
    }
}
