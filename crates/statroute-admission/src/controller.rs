//! Per-provider admission control
//!
//! Each provider gets its own state (request windows plus circuit breaker)
//! created on first use. State is only locked for reads and updates; the
//! lock is never held across an `.await`.

use dashmap::DashMap;
use dashmap::mapref::one::RefMut;
use statroute_core::Provider;
use std::time::Duration;
use tokio::time::Instant;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::config::{AdmissionConfig, AdmissionSettings};
use crate::window::SlidingWindow;

/// Snapshot of a provider's admission state
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitStatus {
    pub provider: Provider,
    pub state: CircuitState,
    pub open: bool,
    pub consecutive_failures: u32,
    pub cooldown_remaining: Duration,
    pub requests_in_minute: usize,
    pub requests_in_hour: usize,
}

#[derive(Debug)]
struct AdmissionState {
    config: AdmissionConfig,
    last_request: Option<Instant>,
    minute_window: SlidingWindow,
    hour_window: SlidingWindow,
    breaker: CircuitBreaker,
}

impl AdmissionState {
    fn new(provider: Provider, config: AdmissionConfig, schedule: Vec<Duration>) -> Self {
        let breaker = CircuitBreaker::new(
            provider,
            CircuitBreakerConfig {
                cooldown_schedule: schedule,
                enabled: config.circuit_breaker_enabled,
            },
        );
        Self {
            config,
            last_request: None,
            minute_window: SlidingWindow::per_minute(),
            hour_window: SlidingWindow::per_hour(),
            breaker,
        }
    }

    /// Longest of the spacing, minute-window and hour-window waits
    fn delay(&mut self, now: Instant) -> Duration {
        let spacing = match self.last_request {
            Some(last) => (last + self.config.min_delay()).saturating_duration_since(now),
            None => Duration::ZERO,
        };
        let minute = self
            .config
            .max_per_minute
            .map(|cap| self.minute_window.wait_for_slot(now, cap))
            .unwrap_or(Duration::ZERO);
        let hour = self
            .config
            .max_per_hour
            .map(|cap| self.hour_window.wait_for_slot(now, cap))
            .unwrap_or(Duration::ZERO);
        spacing.max(minute).max(hour)
    }

    fn record(&mut self, now: Instant) {
        self.last_request = Some(now);
        self.minute_window.record(now);
        self.hour_window.record(now);
    }
}

/// Rate limiter and circuit breaker for every provider
#[derive(Debug)]
pub struct AdmissionControl {
    settings: AdmissionSettings,
    states: DashMap<Provider, AdmissionState>,
}

impl AdmissionControl {
    pub fn new(settings: AdmissionSettings) -> Self {
        Self {
            settings,
            states: DashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(AdmissionSettings::default())
    }

    pub fn settings(&self) -> &AdmissionSettings {
        &self.settings
    }

    fn state(&self, provider: Provider) -> RefMut<'_, Provider, AdmissionState> {
        self.states.entry(provider).or_insert_with(|| {
            AdmissionState::new(
                provider,
                self.settings.config_for(provider),
                self.settings.cooldown_schedule(),
            )
        })
    }

    /// How long the caller must wait before `provider` may be called
    pub fn delay_until_ready(&self, provider: Provider) -> Duration {
        self.state(provider).delay(Instant::now())
    }

    /// Sleep until `provider` is ready; returns the time slept.
    ///
    /// Does not record the request. Callers that want the check and the
    /// record to be atomic use [`AdmissionControl::acquire`].
    pub async fn wait_until_ready(&self, provider: Provider) -> Duration {
        let delay = self.delay_until_ready(provider);
        if !delay.is_zero() {
            tracing::debug!(
                provider = %provider,
                delay_ms = delay.as_millis() as u64,
                "Waiting for admission"
            );
            tokio::time::sleep(delay).await;
        }
        delay
    }

    /// Wait for a slot and record the request in one step; returns the total wait.
    ///
    /// Readiness is re-checked after every sleep, so concurrent callers for
    /// the same provider never overrun the windows. Cancelling the future
    /// while it sleeps records nothing.
    pub async fn acquire(&self, provider: Provider) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let delay = {
                let mut state = self.state(provider);
                let now = Instant::now();
                let delay = state.delay(now);
                if delay.is_zero() {
                    state.record(now);
                    return waited;
                }
                delay
            };
            tracing::debug!(
                provider = %provider,
                delay_ms = delay.as_millis() as u64,
                "Waiting for admission"
            );
            tokio::time::sleep(delay).await;
            waited += delay;
        }
    }

    /// Record that a request to `provider` is being sent now
    pub fn record_request(&self, provider: Provider) {
        self.state(provider).record(Instant::now());
    }

    /// Record an upstream rate-limit error; returns the cooldown applied
    pub fn record_rate_limit_error(&self, provider: Provider) -> Duration {
        self.state(provider).breaker.record_failure(Instant::now())
    }

    /// Record a successful call: resets the failure count and closes the circuit
    pub fn record_success(&self, provider: Provider) {
        self.state(provider).breaker.record_success();
    }

    /// Advisory check; an elapsed cooldown closes the circuit and returns false
    pub fn is_circuit_open(&self, provider: Provider) -> bool {
        self.state(provider).breaker.is_open(Instant::now())
    }

    pub fn circuit_status(&self, provider: Provider) -> CircuitStatus {
        let mut state = self.state(provider);
        let now = Instant::now();
        let circuit = state.breaker.state(now);
        CircuitStatus {
            provider,
            state: circuit,
            open: circuit == CircuitState::Open,
            consecutive_failures: state.breaker.consecutive_failures(),
            cooldown_remaining: state.breaker.cooldown_remaining(now),
            requests_in_minute: state.minute_window.count(now),
            requests_in_hour: state.hour_window.count(now),
        }
    }
}

impl Default for AdmissionControl {
    fn default() -> Self {
        Self::with_defaults()
    }
}
