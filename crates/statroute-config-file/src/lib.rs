//! File-based configuration loading for StatRoute
//!
//! Reads YAML or TOML configuration files (chosen by extension) and
//! deserializes them into any `serde` type.
//!
//! # Example
//! ```no_run
//! # use statroute_config_file::FileConfigLoader;
//! # fn example() -> statroute_core::Result<()> {
//! let loader = FileConfigLoader::new("~/.statroute/config.yaml")?;
//! let config: serde_json::Value = loader.load()?;
//! # Ok(())
//! # }
//! ```

mod file_loader;

pub use file_loader::{ConfigFormat, FileConfigLoader, expand_tilde, load_config};
