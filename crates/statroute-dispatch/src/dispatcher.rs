//! Dispatcher that walks a routing decision's provider chain
//!
//! For each candidate (primary first, then fallbacks) the dispatcher:
//! - skips providers with no registered adapter or an open circuit
//! - answers from the response cache when possible
//! - waits for admission, calls the adapter and records the outcome
//!
//! Only a failure of every candidate is surfaced to the caller.

use statroute_admission::AdmissionControl;
use statroute_cache::{ResponseCache, ttl_for};
use statroute_core::{
    DataQuery, Error, Provider, ProviderAdapter, Result, RouteInput, RoutingDecision,
};
use statroute_observability::{CircuitGaugeState, Metrics};
use statroute_routing::{HybridRanker, RoutingEngine};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::BatchConfig;

/// Successful dispatch
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Provider that supplied the value
    pub provider: Provider,
    pub decision: RoutingDecision,
    pub value: serde_json::Value,
    pub from_cache: bool,
    /// Providers whose adapter was actually called, in order
    pub attempts: Vec<Provider>,
}

/// Why the dispatcher moved past a provider
#[derive(Debug, Clone, Copy)]
enum SkipReason {
    CircuitOpen,
    RateLimited,
    Error,
}

impl SkipReason {
    fn as_str(&self) -> &'static str {
        match self {
            SkipReason::CircuitOpen => "circuit_open",
            SkipReason::RateLimited => "rate_limited",
            SkipReason::Error => "error",
        }
    }
}

/// Routes queries and fetches them from the chosen providers
pub struct Dispatcher {
    engine: Arc<RoutingEngine>,
    ranker: Option<HybridRanker>,
    admission: Arc<AdmissionControl>,
    cache: Arc<ResponseCache>,
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
    metrics: Option<Metrics>,
    pub(crate) batch: BatchConfig,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<RoutingEngine>,
        admission: Arc<AdmissionControl>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            engine,
            ranker: None,
            admission,
            cache,
            adapters: HashMap::new(),
            metrics: None,
            batch: BatchConfig::default(),
        }
    }

    /// Route through the oracle-assisted ranker instead of the engine alone
    pub fn with_ranker(mut self, ranker: HybridRanker) -> Self {
        self.ranker = Some(ranker);
        self
    }

    /// Register an adapter; a second adapter for the same provider replaces the first
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_batch_config(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn engine(&self) -> &Arc<RoutingEngine> {
        &self.engine
    }

    pub fn admission(&self) -> &Arc<AdmissionControl> {
        &self.admission
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    pub fn has_adapter(&self, provider: Provider) -> bool {
        self.adapters.contains_key(&provider)
    }

    /// Routing decision for `query`, oracle-assisted when a ranker is set
    pub async fn route(&self, query: &DataQuery) -> RoutingDecision {
        let input = RouteInput::from(query);
        let decision = match &self.ranker {
            Some(ranker) => ranker.route(&input).await,
            None => self.engine.route(&input),
        };

        tracing::info!(
            provider = %decision.provider(),
            match_type = ?decision.match_type(),
            confidence = decision.confidence(),
            fallbacks = ?decision.fallbacks(),
            "Route decision made"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_routing_decision(decision.match_type().as_str(), decision.provider().as_str());
        }
        decision
    }

    /// Route `query` and fetch it from the first provider that answers
    ///
    /// # Errors
    /// `Error::AllProvidersFailed` when every candidate was skipped or failed
    pub async fn fetch(&self, query: &DataQuery) -> Result<DispatchOutcome> {
        let decision = self.route(query).await;
        let params = query.cache_params();
        let ttl = ttl_for(query.frequency);

        let mut attempts = Vec::new();
        let mut last_skip: Option<(Provider, SkipReason)> = None;

        for provider in decision.candidates() {
            let Some(adapter) = self.adapters.get(&provider) else {
                tracing::debug!(provider = %provider, "No adapter registered, skipping provider");
                continue;
            };

            if let Some((from, reason)) = last_skip {
                tracing::info!(
                    from = %from,
                    to = %provider,
                    reason = reason.as_str(),
                    "Falling back to next provider"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_fallback(from.as_str(), provider.as_str(), reason.as_str());
                }
            }

            let circuit_open = self.admission.is_circuit_open(provider);
            if let Some(metrics) = &self.metrics {
                // Refreshed on every check so a self-healed circuit reads closed
                let state = if circuit_open {
                    CircuitGaugeState::Open
                } else {
                    CircuitGaugeState::Closed
                };
                metrics.update_circuit_breaker_state(provider.as_str(), state);
            }
            if circuit_open {
                tracing::warn!(provider = %provider, "Circuit breaker is open, skipping provider");
                last_skip = Some((provider, SkipReason::CircuitOpen));
                continue;
            }

            if let Some(value) = self.cache.cache_get(provider, &params) {
                if let Some(metrics) = &self.metrics {
                    metrics.record_cache_hit(provider.as_str());
                }
                return Ok(DispatchOutcome {
                    provider,
                    decision,
                    value,
                    from_cache: true,
                    attempts,
                });
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_miss(provider.as_str());
            }

            let waited = self.admission.acquire(provider).await;
            if let Some(metrics) = &self.metrics {
                metrics.record_admission_wait(provider.as_str(), waited.as_secs_f64());
            }

            attempts.push(provider);
            tracing::debug!(provider = %provider, "Attempting request to provider");

            match adapter.fetch(query).await {
                Ok(value) => {
                    self.admission.record_success(provider);
                    self.cache.cache_set(provider, &params, value.clone(), ttl);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_provider_outcome(provider.as_str(), "success");
                        metrics.update_circuit_breaker_state(provider.as_str(), CircuitGaugeState::Closed);
                    }
                    tracing::info!(
                        provider = %provider,
                        attempts = attempts.len(),
                        "Request succeeded"
                    );
                    return Ok(DispatchOutcome {
                        provider,
                        decision,
                        value,
                        from_cache: false,
                        attempts,
                    });
                }
                Err(err) if err.is_rate_limit() => {
                    let cooldown = self.admission.record_rate_limit_error(provider);
                    tracing::warn!(
                        provider = %provider,
                        error = %err,
                        cooldown_secs = cooldown.as_secs(),
                        "Provider rate limited"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_provider_outcome(provider.as_str(), "rate_limited");
                        if !cooldown.is_zero() {
                            metrics.record_circuit_opened(provider.as_str());
                        }
                    }
                    last_skip = Some((provider, SkipReason::RateLimited));
                }
                Err(err) => {
                    tracing::warn!(provider = %provider, error = %err, "Request failed");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_provider_outcome(provider.as_str(), "error");
                    }
                    last_skip = Some((provider, SkipReason::Error));
                }
            }
        }

        tracing::error!(
            primary = %decision.provider(),
            attempted = ?attempts,
            "All providers failed"
        );
        Err(Error::AllProvidersFailed {
            attempted: attempts,
        })
    }
}
