//! Collaborator interfaces consumed by the routing layer
//!
//! Neither collaborator is implemented in this workspace:
//! - [`RankingOracle`] is typically an LLM call that picks one provider from a
//!   candidate list.
//! - [`Catalog`] knows which providers carry which indicator concepts.

use crate::provider::Provider;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use thiserror::Error;

/// Indicator catalog lookup keyed by a normalized concept name
pub trait Catalog: Send + Sync {
    /// Whether `provider` can serve `concept`
    fn is_provider_available(&self, concept: &str, provider: Provider) -> bool;

    /// Preferred provider for `concept`, if the catalog knows it
    fn best_provider(&self, concept: &str) -> Option<Provider>;
}

/// Provider offered to the ranking oracle along with its weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub provider: Provider,
    pub weight: f64,
    /// Why this provider is in the set ("deterministic winner", "indicator: cpi")
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// Everything the oracle is allowed to see
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankRequest {
    pub query: String,
    #[serde(default)]
    pub indicators: Vec<String>,
    pub candidates: Vec<Candidate>,
    /// Provider the deterministic engine picked
    pub deterministic_choice: Provider,
}

impl RankRequest {
    /// Render the request as a plain-text prompt for text-only oracles
    pub fn prompt(&self) -> String {
        let mut prompt = String::new();
        let _ = writeln!(prompt, "Query: {}", self.query);
        if !self.indicators.is_empty() {
            let _ = writeln!(prompt, "Indicators: {}", self.indicators.join(", "));
        }
        let _ = writeln!(prompt, "Candidate providers (highest weight first):");
        for candidate in &self.candidates {
            let _ = write!(prompt, "- {} (weight {:.1})", candidate.provider, candidate.weight);
            if !candidate.reasons.is_empty() {
                let _ = write!(prompt, ": {}", candidate.reasons.join("; "));
            }
            prompt.push('\n');
        }
        let _ = writeln!(
            prompt,
            "Answer with JSON: {{\"provider\": <one of the candidates>, \"confidence\": <0-1>, \"reasoning\": <text>, \"fallbacks\": [<providers>]}}"
        );
        prompt
    }
}

/// Oracle answer. `provider` stays a raw string so the ranker can reject
/// names outside the provider set instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankResult {
    pub provider: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

impl RankResult {
    /// Parse a raw JSON answer, tolerating surrounding prose or code fences
    pub fn parse(raw: &str) -> Result<Self, OracleError> {
        let start = raw
            .find('{')
            .ok_or_else(|| OracleError::Malformed("no JSON object in response".to_string()))?;
        let end = raw
            .rfind('}')
            .ok_or_else(|| OracleError::Malformed("unterminated JSON object".to_string()))?;
        if end < start {
            return Err(OracleError::Malformed("unterminated JSON object".to_string()));
        }
        serde_json::from_str(&raw[start..=end]).map_err(|e| OracleError::Malformed(e.to_string()))
    }
}

/// Why an oracle call produced no usable answer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("Oracle timed out")]
    Timeout,

    #[error("Oracle transport error: {0}")]
    Transport(String),

    #[error("Malformed oracle response: {0}")]
    Malformed(String),
}

/// External ranking oracle
#[async_trait::async_trait]
pub trait RankingOracle: Send + Sync {
    async fn rank(&self, request: &RankRequest) -> Result<RankResult, OracleError>;
}
