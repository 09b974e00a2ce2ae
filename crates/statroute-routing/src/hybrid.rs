//! Oracle-assisted routing
//!
//! The deterministic engine always runs first. Its decision seeds a weighted
//! candidate set that is shown to an external ranking oracle; the oracle's
//! answer is only accepted after passing every guardrail. Any oracle failure
//! returns the deterministic decision unchanged.

use serde::{Deserialize, Serialize};
use statroute_core::{
    Candidate, MatchType, OracleError, Provider, RankRequest, RankResult, RankingOracle,
    RouteInput, RoutingDecision,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::RoutingEngine;

const WINNER_WEIGHT: f64 = 10.0;
const FIRST_FALLBACK_WEIGHT: f64 = 6.0;
const MIN_FALLBACK_WEIGHT: f64 = 1.0;
const PATTERN_HIT_BONUS: f64 = 3.0;
const BASE_WEIGHT: f64 = 0.5;

/// Oracle ranking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Per-attempt oracle timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Extra attempts after the first one fails; at most [`MAX_ORACLE_RETRIES`]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout_ms() -> u64 {
    8000
}

fn default_max_candidates() -> usize {
    8
}

/// The oracle is retried at most once
pub const MAX_ORACLE_RETRIES: u32 = 1;

fn default_max_retries() -> u32 {
    MAX_ORACLE_RETRIES
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: default_timeout_ms(),
            max_candidates: default_max_candidates(),
            max_retries: default_max_retries(),
        }
    }
}

impl HybridConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Deterministic routing refined by a ranking oracle
pub struct HybridRanker {
    engine: Arc<RoutingEngine>,
    oracle: Arc<dyn RankingOracle>,
    config: HybridConfig,
}

impl HybridRanker {
    pub fn new(
        engine: Arc<RoutingEngine>,
        oracle: Arc<dyn RankingOracle>,
        config: HybridConfig,
    ) -> Self {
        Self {
            engine,
            oracle,
            config,
        }
    }

    pub fn engine(&self) -> &Arc<RoutingEngine> {
        &self.engine
    }

    /// Weighted candidates for `input`, highest weight first
    pub fn candidates(&self, input: &RouteInput, deterministic: &RoutingDecision) -> Vec<Candidate> {
        let mut weights: HashMap<Provider, (f64, Vec<String>)> = Provider::ALL
            .iter()
            .map(|p| (*p, (BASE_WEIGHT, Vec::new())))
            .collect();

        if let Some(entry) = weights.get_mut(&deterministic.provider()) {
            entry.0 = WINNER_WEIGHT;
            entry.1.push(format!(
                "deterministic winner ({})",
                deterministic.match_type().as_str()
            ));
        }

        for (rank, fallback) in deterministic.fallbacks().iter().enumerate() {
            let weight = (FIRST_FALLBACK_WEIGHT - rank as f64).max(MIN_FALLBACK_WEIGHT);
            if let Some(entry) = weights.get_mut(fallback) {
                if weight > entry.0 {
                    entry.0 = weight;
                    entry.1.push(format!("fallback #{}", rank + 1));
                }
            }
        }

        for hit in self.engine.pattern_hits(input) {
            if let Some(entry) = weights.get_mut(&hit.provider) {
                entry.0 += PATTERN_HIT_BONUS;
                entry
                    .1
                    .push(format!("{}: {}", hit.match_type.as_str(), hit.pattern));
            }
        }

        let mut candidates: Vec<Candidate> = weights
            .into_iter()
            .map(|(provider, (weight, reasons))| Candidate {
                provider,
                weight,
                reasons,
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.provider.cmp(&b.provider))
        });
        candidates.truncate(self.config.max_candidates.max(1));
        candidates
    }

    /// Route with oracle assistance. Never fails: every rejected or missing
    /// oracle answer yields the deterministic decision.
    pub async fn route(&self, input: &RouteInput) -> RoutingDecision {
        let deterministic = self.engine.route(input);
        let candidates = self.candidates(input, &deterministic);

        let request = RankRequest {
            query: input.query.clone(),
            indicators: input.indicators.clone(),
            candidates,
            deterministic_choice: deterministic.provider(),
        };

        let answer = match self.ask_oracle(&request).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = %deterministic.provider(),
                    "Oracle ranking failed, using deterministic decision"
                );
                return deterministic;
            }
        };

        match self.accept(input, &request, &deterministic, answer) {
            Some(decision) => {
                tracing::debug!(
                    provider = %decision.provider(),
                    deterministic = %deterministic.provider(),
                    "Oracle decision accepted"
                );
                decision
            }
            None => deterministic,
        }
    }

    async fn ask_oracle(&self, request: &RankRequest) -> Result<RankResult, OracleError> {
        let attempts = self.config.max_retries.min(MAX_ORACLE_RETRIES) + 1;
        let mut last_error = OracleError::Timeout;

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.config.timeout(), self.oracle.rank(request)).await {
                Ok(Ok(answer)) => return Ok(answer),
                Ok(Err(e)) => {
                    tracing::debug!(attempt, error = %e, "Oracle attempt failed");
                    last_error = e;
                }
                Err(_) => {
                    tracing::debug!(
                        attempt,
                        timeout_ms = self.config.timeout_ms,
                        "Oracle attempt timed out"
                    );
                    last_error = OracleError::Timeout;
                }
            }
        }
        Err(last_error)
    }

    /// Apply the guardrails; `None` means "keep the deterministic decision"
    fn accept(
        &self,
        input: &RouteInput,
        request: &RankRequest,
        deterministic: &RoutingDecision,
        answer: RankResult,
    ) -> Option<RoutingDecision> {
        let chosen = match answer.provider.parse::<Provider>() {
            Ok(provider) => provider,
            Err(_) => {
                tracing::warn!(choice = %answer.provider, "Oracle chose an unknown provider");
                return None;
            }
        };

        // Out-of-candidate choice
        if !request.candidates.iter().any(|c| c.provider == chosen) {
            tracing::warn!(choice = %chosen, "Oracle chose a provider outside the candidate set");
            return None;
        }

        // An explicit mention is never overridden
        if let Some(explicit) = self.engine.matcher().detect_explicit_provider(&input.query) {
            if explicit.provider != chosen {
                tracing::info!(
                    choice = %chosen,
                    explicit = %explicit.provider,
                    "Explicit provider mention overrides oracle"
                );
                return None;
            }
        }

        let (provider, correction) =
            self.engine
                .matcher()
                .correct_misrouting(chosen, &input.query, &input.indicators);

        if let Some(catalog) = self.engine.catalog() {
            let concept = RoutingEngine::concept_for(input);
            if !concept.is_empty() && !catalog.is_provider_available(&concept, provider) {
                tracing::info!(
                    provider = %provider,
                    concept = %concept,
                    "Oracle choice not in catalog, using deterministic decision"
                );
                return None;
            }
        }

        let mut reasoning = if answer.reasoning.is_empty() {
            format!("Oracle chose {}", chosen)
        } else {
            answer.reasoning.clone()
        };
        if let Some(name) = &correction {
            reasoning.push_str(&format!(" (corrected {} -> {}: {})", chosen, provider, name));
        }

        let mut fallbacks: Vec<Provider> = answer
            .fallbacks
            .iter()
            .filter_map(|name| name.parse::<Provider>().ok())
            .filter(|p| *p != provider)
            .collect();
        if fallbacks.is_empty() {
            fallbacks = self.engine.fallback_map().chain(provider).to_vec();
        }

        let confidence = if correction.is_some() {
            answer.confidence.min(deterministic.confidence())
        } else {
            answer.confidence
        };

        let decision = RoutingDecision::new(provider, confidence, MatchType::Llm, reasoning)
            .with_fallbacks(fallbacks);
        Some(match correction {
            Some(name) => decision.with_matched_pattern(name),
            None => decision,
        })
    }
}
