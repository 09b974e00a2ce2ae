//! Cache configuration

use serde::{Deserialize, Serialize};
use statroute_core::{Error, Result};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Size the sweep trims back to
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Minimum time between two routine sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Share of entries evicted when the cache is over capacity
    #[serde(default = "default_eviction_fraction")]
    pub eviction_fraction: f64,
}

fn default_max_entries() -> usize {
    10_000
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_eviction_fraction() -> f64 {
    0.1
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            sweep_interval_secs: default_sweep_interval_secs(),
            eviction_fraction: default_eviction_fraction(),
        }
    }
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(Error::ConfigValidation(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }
        if !(self.eviction_fraction > 0.0 && self.eviction_fraction <= 1.0) {
            return Err(Error::ConfigValidation(format!(
                "cache.eviction_fraction must be in (0, 1], got {}",
                self.eviction_fraction
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, 10_000);
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_fraction_and_zero_size() {
        for fraction in [0.0, -0.5, 1.5, f64::NAN] {
            let config = CacheConfig {
                eviction_fraction: fraction,
                ..CacheConfig::default()
            };
            assert!(config.validate().is_err(), "accepted {}", fraction);
        }

        let config = CacheConfig {
            max_entries: 0,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
