//! File-based configuration loader

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use statroute_core::{Error, Result};

/// On-disk configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML; everything else is read as YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_tilde(path: impl Into<PathBuf>) -> Result<PathBuf> {
    let path = path.into();
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path),
    }
}

/// Configuration file on disk
#[derive(Debug, Clone)]
pub struct FileConfigLoader {
    config_path: PathBuf,
    format: ConfigFormat,
}

impl FileConfigLoader {
    /// Create a loader for an existing file
    ///
    /// # Errors
    /// - `Error::Config` if `~` cannot be expanded
    /// - `Error::ConfigNotFound` if the file doesn't exist
    pub fn new(config_path: impl Into<PathBuf>) -> Result<Self> {
        let config_path = expand_tilde(config_path)?;

        if !config_path.exists() {
            return Err(Error::ConfigNotFound);
        }

        let format = ConfigFormat::from_path(&config_path);
        debug!(path = %config_path.display(), format = ?format, "Initialized FileConfigLoader");

        Ok(Self {
            config_path,
            format,
        })
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    /// Read and parse the file into a JSON value
    pub fn read_value(&self) -> Result<serde_json::Value> {
        let contents = std::fs::read_to_string(&self.config_path).map_err(|e| {
            error!("Failed to read config file: {}", e);
            Error::Io(e)
        })?;

        if contents.trim().is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }

        let value = match self.format {
            ConfigFormat::Toml => {
                let toml_value: toml::Value = toml::from_str(&contents).map_err(|e| {
                    error!("Failed to parse TOML config: {}", e);
                    Error::Config(format!("Invalid TOML: {}", e))
                })?;
                serde_json::to_value(toml_value).map_err(|e| {
                    error!("Failed to convert TOML to JSON: {}", e);
                    Error::Config(format!("TOML conversion error: {}", e))
                })?
            }
            ConfigFormat::Yaml => serde_yaml::from_str(&contents).map_err(|e| {
                error!("Failed to parse YAML config: {}", e);
                Error::Config(format!("Invalid YAML: {}", e))
            })?,
        };

        Ok(value)
    }

    /// Read the file and deserialize it into `T`
    pub fn load<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.read_value()?;
        let config = serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;
        info!(path = %self.config_path.display(), "Loaded configuration");
        Ok(config)
    }
}

/// Shorthand for `FileConfigLoader::new(path)?.load()`
pub fn load_config<T: DeserializeOwned>(path: impl Into<PathBuf>) -> Result<T> {
    FileConfigLoader::new(path)?.load()
}
