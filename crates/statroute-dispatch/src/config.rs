//! Dispatch configuration

use serde::{Deserialize, Serialize};
use statroute_admission::AdmissionSettings;
use statroute_cache::CacheConfig;
use statroute_config_file::{expand_tilde, load_config};
use statroute_core::{Error, Provider, Result};
use statroute_observability::LoggingConfig;
use statroute_routing::{HybridConfig, MAX_ORACLE_RETRIES, RoutingTables};
use std::path::{Path, PathBuf};

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub routing: RoutingSettings,

    #[serde(default)]
    pub hybrid: HybridConfig,

    #[serde(default)]
    pub admission: AdmissionSettings,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSettings {
    /// Routing tables file; the embedded tables are used when unset
    #[serde(default)]
    pub tables_path: Option<PathBuf>,

    /// Provider chosen when no rule matches
    #[serde(default = "default_provider")]
    pub default_provider: Provider,
}

fn default_provider() -> Provider {
    Provider::WorldBank
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            tables_path: None,
            default_provider: default_provider(),
        }
    }
}

impl RoutingSettings {
    /// Load the configured tables, or the embedded ones
    pub fn load_tables(&self) -> Result<RoutingTables> {
        let tables = match &self.tables_path {
            Some(path) => RoutingTables::from_path(expand_tilde(path)?),
            None => RoutingTables::embedded(),
        };
        tables.map_err(|e| Error::ConfigValidation(format!("routing tables: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Concurrent branches in a multi-country fetch
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    3
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl DispatchConfig {
    /// Load from a YAML or TOML file and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: DispatchConfig = load_config(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.admission.validate()?;
        self.cache.validate()?;

        if self.batch.max_concurrency == 0 {
            return Err(Error::ConfigValidation(
                "batch.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.hybrid.timeout_ms == 0 {
            return Err(Error::ConfigValidation(
                "hybrid.timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.hybrid.max_candidates == 0 {
            return Err(Error::ConfigValidation(
                "hybrid.max_candidates must be at least 1".to_string(),
            ));
        }
        if self.hybrid.max_retries > MAX_ORACLE_RETRIES {
            return Err(Error::ConfigValidation(format!(
                "hybrid.max_retries must be at most {}, got {}",
                MAX_ORACLE_RETRIES, self.hybrid.max_retries
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    const FULL: &str = r#"
routing:
  default_provider: OECD
hybrid:
  enabled: true
  timeout_ms: 2000
admission:
  cooldown_schedule_secs: [60, 120, 300, 600]
  providers:
    FRED: { min_delay_secs: 0.5, max_per_minute: 120 }
    COMTRADE: { min_delay_secs: 1.0, max_per_minute: 30, max_per_hour: 500 }
    COINGECKO: { min_delay_secs: 1.5, max_per_minute: 30, circuit_breaker_enabled: false }
cache:
  max_entries: 500
batch:
  max_concurrency: 5
logging:
  level: debug
  json: true
"#;

    #[test]
    fn test_defaults() {
        let config: DispatchConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, DispatchConfig::default());
        assert_eq!(config.routing.default_provider, Provider::WorldBank);
        assert_eq!(config.batch.max_concurrency, 3);
        assert!(!config.hybrid.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_file() {
        let config: DispatchConfig = serde_yaml::from_str(FULL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.routing.default_provider, Provider::Oecd);
        assert_eq!(config.hybrid.timeout_ms, 2000);
        assert_eq!(config.hybrid.max_retries, 1);
        assert_eq!(config.cache.max_entries, 500);
        assert_eq!(config.cache.eviction_fraction, 0.1);
        assert_eq!(config.batch.max_concurrency, 5);
        assert!(config.logging.json);

        let comtrade = config.admission.config_for(Provider::Comtrade);
        assert_eq!(comtrade.max_per_hour, Some(500));
        assert_eq!(comtrade.min_delay(), Duration::from_secs(1));
        assert!(!config.admission.config_for(Provider::CoinGecko).circuit_breaker_enabled);
        assert!(config.admission.config_for(Provider::Imf).circuit_breaker_enabled);
    }

    #[test]
    fn test_validation_failures() {
        let zero_cap = "admission:\n  providers:\n    FRED: { max_per_minute: 0 }\n";
        let negative = "admission:\n  providers:\n    FRED: { min_delay_secs: -1.0 }\n";
        let empty_schedule = "admission:\n  cooldown_schedule_secs: []\n";
        let fraction = "cache:\n  eviction_fraction: 1.5\n";
        let concurrency = "batch:\n  max_concurrency: 0\n";
        let retries = "hybrid:\n  max_retries: 2\n";

        for yaml in [zero_cap, negative, empty_schedule, fraction, concurrency, retries] {
            let config: DispatchConfig = serde_yaml::from_str(yaml).unwrap();
            assert!(
                matches!(config.validate(), Err(Error::ConfigValidation(_))),
                "expected validation failure for {:?}",
                yaml
            );
        }
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statroute.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"[routing]\ndefault_provider = \"IMF\"\n\n[batch]\nmax_concurrency = 2\n")
            .unwrap();

        let config = DispatchConfig::load(&path).unwrap();
        assert_eq!(config.routing.default_provider, Provider::Imf);
        assert_eq!(config.batch.max_concurrency, 2);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statroute.yaml");
        std::fs::write(&path, "batch:\n  max_concurrency: 0\n").unwrap();
        assert!(matches!(
            DispatchConfig::load(&path),
            Err(Error::ConfigValidation(_))
        ));
    }

    #[test]
    fn test_tables_embedded_and_missing_path() {
        let settings = RoutingSettings::default();
        assert!(settings.load_tables().is_ok());

        let missing = RoutingSettings {
            tables_path: Some(PathBuf::from("/nonexistent/routing_tables.yaml")),
            ..RoutingSettings::default()
        };
        assert!(matches!(
            missing.load_tables(),
            Err(Error::ConfigValidation(msg)) if msg.starts_with("routing tables")
        ));
    }
}
