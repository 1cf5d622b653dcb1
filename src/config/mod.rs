//! Configuration management for depimage
//!
//! Two files are merged, later wins per key:
//! 1. User-global: `~/.config/depimage/config.toml`
//! 2. Project-local: `depimage.toml` in the working directory or an ancestor

pub mod schema;

pub use schema::Config;

use crate::error::{DepImageError, DepImageResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// File name of the project-local config
pub const LOCAL_CONFIG_FILE: &str = "depimage.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("depimage")
            .join("config.toml")
    }

    /// Find `depimage.toml` in `start` or the nearest ancestor
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|path| path.is_file())
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> DepImageResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> DepImageResult<Config> {
        let value = read_toml(path).await?;
        into_config(value, path)
    }

    /// Load the global config and overlay a project-local one.
    ///
    /// Relative paths are resolved against the local config's directory, or
    /// `project_dir` when there is no local config.
    pub async fn load_merged(
        &self,
        local_path: Option<&Path>,
        project_dir: &Path,
    ) -> DepImageResult<Config> {
        let mut merged = if self.config_path.exists() {
            read_toml(&self.config_path).await?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let (source, base_dir) = match local_path {
            Some(local) => {
                debug!("Merging local config {}", local.display());
                merge_toml(&mut merged, read_toml(local).await?);
                let base = local.parent().unwrap_or(project_dir).to_path_buf();
                (local.to_path_buf(), base)
            }
            None => (self.config_path.clone(), project_dir.to_path_buf()),
        };

        let mut config = into_config(merged, &source)?;
        config.resolve_paths(&base_dir);
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> DepImageResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            DepImageError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> DepImageResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                DepImageError::io(format!("creating config directory {}", parent.display()), e)
            })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_toml(path: &Path) -> DepImageResult<toml::Value> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| DepImageError::io(format!("reading config from {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| DepImageError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn into_config(value: toml::Value, source: &Path) -> DepImageResult<Config> {
    let config: Config = value.try_into().map_err(|e: toml::de::Error| {
        DepImageError::ConfigInvalid {
            path: source.to_path_buf(),
            reason: e.to_string(),
        }
    })?;
    config.validate(source)?;
    Ok(config)
}

/// Recursively overlay `overlay` onto `base`; tables merge, other values replace
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
