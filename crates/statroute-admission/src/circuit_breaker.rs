//! Circuit Breaker Implementation
//!
//! Implements a per-provider circuit breaker driven by upstream rate-limit
//! errors. The circuit breaker has two states:
//! - Closed: Normal operation, requests pass through
//! - Open: Provider is cooling down, callers should skip it
//!
//! State transitions:
//! - Closed → Open: On a rate-limit error
//! - Open → Open: Another rate-limit error escalates the cooldown
//! - Open → Closed: On success, or once the cooldown has elapsed
//!
//! Cooldowns follow a schedule indexed by consecutive failures (60s, 120s,
//! 300s, 600s by default), capped at the last entry and measured from the
//! error. There is no half-open state.

use statroute_core::Provider;
use std::time::Duration;
use tokio::time::Instant;

/// Longest cooldown the breaker will apply
pub const MAX_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Cooling down - callers skip the provider
    Open,
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Cooldown per consecutive failure; the last entry repeats
    pub cooldown_schedule: Vec<Duration>,
    /// When false, failures are counted but the circuit never opens
    pub enabled: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            cooldown_schedule: [60, 120, 300, 600]
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
            enabled: true,
        }
    }
}

impl CircuitBreakerConfig {
    /// Cooldown after the `failures`-th consecutive failure (1-based),
    /// never longer than [`MAX_COOLDOWN`]
    pub fn cooldown_for(&self, failures: u32) -> Duration {
        let index = (failures.max(1) - 1) as usize;
        self.cooldown_schedule
            .get(index)
            .or_else(|| self.cooldown_schedule.last())
            .copied()
            .unwrap_or(Duration::ZERO)
            .min(MAX_COOLDOWN)
    }
}

/// Circuit breaker for a single provider.
///
/// Not synchronized itself; the admission controller keeps it behind the
/// provider's lock together with the request windows.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    provider: Provider,
    config: CircuitBreakerConfig,
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(provider: Provider, config: CircuitBreakerConfig) -> Self {
        Self {
            provider,
            config,
            consecutive_failures: 0,
            open_until: None,
        }
    }

    pub fn with_defaults(provider: Provider) -> Self {
        Self::new(provider, CircuitBreakerConfig::default())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Current state; an expired cooldown closes the circuit
    pub fn state(&mut self, now: Instant) -> CircuitState {
        match self.open_until {
            Some(until) if now < until => CircuitState::Open,
            Some(_) => {
                self.open_until = None;
                tracing::info!(
                    provider = %self.provider,
                    consecutive_failures = self.consecutive_failures,
                    "Circuit breaker closed (cooldown elapsed)"
                );
                CircuitState::Closed
            }
            None => CircuitState::Closed,
        }
    }

    pub fn is_open(&mut self, now: Instant) -> bool {
        self.state(now) == CircuitState::Open
    }

    /// Record a rate-limit error; returns the cooldown applied (zero when disabled)
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if !self.config.enabled {
            tracing::debug!(
                provider = %self.provider,
                consecutive_failures = self.consecutive_failures,
                "Rate limited; circuit breaker disabled for provider"
            );
            return Duration::ZERO;
        }

        let cooldown = self.config.cooldown_for(self.consecutive_failures);
        self.open_until = Some(now + cooldown);
        tracing::warn!(
            provider = %self.provider,
            consecutive_failures = self.consecutive_failures,
            cooldown_secs = cooldown.as_secs(),
            "Circuit breaker opened"
        );
        cooldown
    }

    /// Record a success: reset and close immediately
    pub fn record_success(&mut self) {
        if self.open_until.is_some() || self.consecutive_failures > 0 {
            tracing::info!(provider = %self.provider, "Circuit breaker closed (recovered)");
        }
        self.consecutive_failures = 0;
        self.open_until = None;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn cooldown_remaining(&self, now: Instant) -> Duration {
        self.open_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }
}
