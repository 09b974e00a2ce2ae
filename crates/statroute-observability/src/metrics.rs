//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for StatRoute:
//! - Routing decisions by match type and provider
//! - Cache hit/miss counts
//! - Circuit breaker openings and current state
//! - Fallback trigger counts
//! - Provider fetch outcomes
//! - Admission wait histogram

use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector for StatRoute
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    // Routing
    /// Decisions produced, by match type and chosen provider
    pub routing_decisions_total: CounterVec,

    // Cache
    pub cache_hits_total: CounterVec,
    pub cache_misses_total: CounterVec,

    // Circuit breaker metrics
    /// Circuit breaker state (0=closed, 1=open)
    pub circuit_breaker_state: GaugeVec,
    /// Times a provider's breaker opened
    pub circuit_breaker_openings_total: CounterVec,

    // Fallback metrics
    /// Fallback trigger count
    pub fallback_triggered: CounterVec,

    // Provider outcomes
    /// Fetch results per provider (success, rate_limited, error)
    pub provider_outcomes_total: CounterVec,

    // Admission
    /// Time spent waiting for an admission slot
    pub admission_wait_seconds: HistogramVec,
}

impl Metrics {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let routing_decisions_total = CounterVec::new(
            Opts::new(
                "statroute_routing_decisions_total",
                "Total routing decisions by match type and provider",
            ),
            &["match_type", "provider"],
        )?;

        let cache_hits_total = CounterVec::new(
            Opts::new("statroute_cache_hits_total", "Response cache hits"),
            &["provider"],
        )?;

        let cache_misses_total = CounterVec::new(
            Opts::new("statroute_cache_misses_total", "Response cache misses"),
            &["provider"],
        )?;

        let circuit_breaker_state = GaugeVec::new(
            Opts::new(
                "statroute_circuit_breaker_state",
                "Circuit breaker state (0=closed, 1=open)",
            ),
            &["provider"],
        )?;

        let circuit_breaker_openings_total = CounterVec::new(
            Opts::new(
                "statroute_circuit_breaker_openings_total",
                "Total circuit breaker openings",
            ),
            &["provider"],
        )?;

        let fallback_triggered = CounterVec::new(
            Opts::new(
                "statroute_fallback_triggered_total",
                "Total number of fallback triggers",
            ),
            &["from_provider", "to_provider", "reason"],
        )?;

        let provider_outcomes_total = CounterVec::new(
            Opts::new(
                "statroute_provider_outcomes_total",
                "Provider fetch outcomes",
            ),
            &["provider", "outcome"],
        )?;

        let admission_wait_seconds = HistogramVec::new(
            HistogramOpts::new(
                "statroute_admission_wait_seconds",
                "Time spent waiting for provider admission",
            )
            .buckets(vec![0.0, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0, 60.0, 300.0]),
            &["provider"],
        )?;

        registry.register(Box::new(routing_decisions_total.clone()))?;
        registry.register(Box::new(cache_hits_total.clone()))?;
        registry.register(Box::new(cache_misses_total.clone()))?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;
        registry.register(Box::new(circuit_breaker_openings_total.clone()))?;
        registry.register(Box::new(fallback_triggered.clone()))?;
        registry.register(Box::new(provider_outcomes_total.clone()))?;
        registry.register(Box::new(admission_wait_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            routing_decisions_total,
            cache_hits_total,
            cache_misses_total,
            circuit_breaker_state,
            circuit_breaker_openings_total,
            fallback_triggered,
            provider_outcomes_total,
            admission_wait_seconds,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every registered metric in the text exposition format
    pub fn gather_text(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }

    /// Record a routing decision
    pub fn record_routing_decision(&self, match_type: &str, provider: &str) {
        self.routing_decisions_total
            .with_label_values(&[match_type, provider])
            .inc();
    }

    pub fn record_cache_hit(&self, provider: &str) {
        self.cache_hits_total.with_label_values(&[provider]).inc();
    }

    pub fn record_cache_miss(&self, provider: &str) {
        self.cache_misses_total.with_label_values(&[provider]).inc();
    }

    /// Record fallback trigger
    pub fn record_fallback(&self, from_provider: &str, to_provider: &str, reason: &str) {
        self.fallback_triggered
            .with_label_values(&[from_provider, to_provider, reason])
            .inc();
    }

    /// Record the result of one provider fetch
    pub fn record_provider_outcome(&self, provider: &str, outcome: &str) {
        self.provider_outcomes_total
            .with_label_values(&[provider, outcome])
            .inc();
    }

    pub fn record_admission_wait(&self, provider: &str, wait_secs: f64) {
        self.admission_wait_seconds
            .with_label_values(&[provider])
            .observe(wait_secs);
    }

    /// Update circuit breaker state
    pub fn update_circuit_breaker_state(&self, provider: &str, state: CircuitGaugeState) {
        self.circuit_breaker_state
            .with_label_values(&[provider])
            .set(state as i64 as f64);
    }

    /// Record a breaker opening and flip the state gauge to open
    pub fn record_circuit_opened(&self, provider: &str) {
        self.circuit_breaker_openings_total
            .with_label_values(&[provider])
            .inc();
        self.update_circuit_breaker_state(provider, CircuitGaugeState::Open);
    }
}

/// Circuit breaker state for metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitGaugeState {
    Closed = 0,
    Open = 1,
}

impl CircuitGaugeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
        }
    }
}
