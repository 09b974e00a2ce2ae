//! Admission control configuration

use serde::{Deserialize, Serialize};
use statroute_core::{Error, Provider, Result};
use std::collections::HashMap;
use std::time::Duration;

use crate::circuit_breaker::MAX_COOLDOWN;

/// Longest accepted `min_delay_secs`
pub const MAX_MIN_DELAY_SECS: f64 = 3600.0;

/// Per-provider admission limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Minimum spacing between two requests, in seconds
    #[serde(default)]
    pub min_delay_secs: f64,

    #[serde(default)]
    pub max_per_minute: Option<u32>,

    #[serde(default)]
    pub max_per_hour: Option<u32>,

    /// Whether rate-limit errors open the circuit for this provider
    #[serde(default = "default_circuit_breaker_enabled")]
    pub circuit_breaker_enabled: bool,
}

fn default_circuit_breaker_enabled() -> bool {
    true
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: 0.0,
            max_per_minute: None,
            max_per_hour: None,
            circuit_breaker_enabled: default_circuit_breaker_enabled(),
        }
    }
}

impl AdmissionConfig {
    pub fn min_delay(&self) -> Duration {
        if self.min_delay_secs.is_finite() && self.min_delay_secs > 0.0 {
            Duration::from_secs_f64(self.min_delay_secs.min(MAX_MIN_DELAY_SECS))
        } else {
            Duration::ZERO
        }
    }

    pub fn validate(&self, provider: Provider) -> Result<()> {
        if !self.min_delay_secs.is_finite() || self.min_delay_secs < 0.0 {
            return Err(Error::ConfigValidation(format!(
                "{}: min_delay_secs must be a non-negative number",
                provider
            )));
        }
        if self.min_delay_secs > MAX_MIN_DELAY_SECS {
            return Err(Error::ConfigValidation(format!(
                "{}: min_delay_secs must be at most {}",
                provider, MAX_MIN_DELAY_SECS
            )));
        }
        if self.max_per_minute == Some(0) {
            return Err(Error::ConfigValidation(format!(
                "{}: max_per_minute must be at least 1",
                provider
            )));
        }
        if self.max_per_hour == Some(0) {
            return Err(Error::ConfigValidation(format!(
                "{}: max_per_hour must be at least 1",
                provider
            )));
        }
        Ok(())
    }
}

/// Admission settings for every provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionSettings {
    /// Cooldown after the 1st, 2nd, 3rd... consecutive rate-limit error;
    /// the last entry repeats
    #[serde(default = "default_cooldown_schedule")]
    pub cooldown_schedule_secs: Vec<u64>,

    #[serde(default)]
    pub providers: HashMap<Provider, AdmissionConfig>,
}

fn default_cooldown_schedule() -> Vec<u64> {
    vec![60, 120, 300, 600]
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            cooldown_schedule_secs: default_cooldown_schedule(),
            providers: HashMap::new(),
        }
    }
}

impl AdmissionSettings {
    /// Limits for `provider`; unlisted providers get the defaults
    pub fn config_for(&self, provider: Provider) -> AdmissionConfig {
        self.providers.get(&provider).cloned().unwrap_or_default()
    }

    pub fn cooldown_schedule(&self) -> Vec<Duration> {
        self.cooldown_schedule_secs
            .iter()
            .map(|secs| Duration::from_secs(*secs))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.cooldown_schedule_secs.is_empty() {
            return Err(Error::ConfigValidation(
                "cooldown_schedule_secs must not be empty".to_string(),
            ));
        }
        if self.cooldown_schedule_secs.contains(&0) {
            return Err(Error::ConfigValidation(
                "cooldown_schedule_secs entries must be positive".to_string(),
            ));
        }
        if let Some(secs) = self
            .cooldown_schedule_secs
            .iter()
            .find(|secs| **secs > MAX_COOLDOWN.as_secs())
        {
            return Err(Error::ConfigValidation(format!(
                "cooldown_schedule_secs entry {} exceeds the {}s maximum",
                secs,
                MAX_COOLDOWN.as_secs()
            )));
        }
        for (provider, config) in &self.providers {
            config.validate(*provider)?;
        }
        Ok(())
    }
}
