//! Routing decision and routing input types

use crate::provider::{DataQuery, Provider};
use serde::{Deserialize, Serialize};

/// Which stage of the routing cascade produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Explicit,
    Indicator,
    Region,
    Country,
    Catalog,
    Llm,
    Default,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Explicit => "explicit",
            MatchType::Indicator => "indicator",
            MatchType::Region => "region",
            MatchType::Country => "country",
            MatchType::Catalog => "catalog",
            MatchType::Llm => "llm",
            MatchType::Default => "default",
        }
    }
}

/// Input to the routing engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteInput {
    pub query: String,
    #[serde(default)]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub external_hint: Option<String>,
}

impl RouteInput {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_indicators<I, S>(mut self, indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indicators = indicators.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.countries = countries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.external_hint = Some(hint.into());
        self
    }
}

impl From<&DataQuery> for RouteInput {
    fn from(query: &DataQuery) -> Self {
        Self {
            query: query.query.clone(),
            indicators: query.indicators.clone(),
            country: query.country.clone(),
            countries: query.countries.clone(),
            external_hint: query.external_hint.clone(),
        }
    }
}

/// Result of routing a request: the chosen provider plus ordered alternates
///
/// Built once per request and never mutated afterwards. The constructor
/// clamps `confidence` into `[0.0, 1.0]` and `with_fallbacks` strips the
/// chosen provider and duplicates from the fallback list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    provider: Provider,
    confidence: f64,
    fallbacks: Vec<Provider>,
    reasoning: String,
    match_type: MatchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched_pattern: Option<String>,
}

impl RoutingDecision {
    pub fn new(
        provider: Provider,
        confidence: f64,
        match_type: MatchType,
        reasoning: impl Into<String>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            provider,
            confidence,
            fallbacks: Vec::new(),
            reasoning: reasoning.into(),
            match_type,
            matched_pattern: None,
        }
    }

    pub fn with_fallbacks<I>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = Provider>,
    {
        let mut cleaned: Vec<Provider> = Vec::new();
        for candidate in fallbacks {
            if candidate != self.provider && !cleaned.contains(&candidate) {
                cleaned.push(candidate);
            }
        }
        self.fallbacks = cleaned;
        self
    }

    pub fn with_matched_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.matched_pattern = Some(pattern.into());
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn fallbacks(&self) -> &[Provider] {
        &self.fallbacks
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    pub fn matched_pattern(&self) -> Option<&str> {
        self.matched_pattern.as_deref()
    }

    /// Primary provider followed by the fallbacks, in the order a caller should try them
    pub fn candidates(&self) -> Vec<Provider> {
        std::iter::once(self.provider)
            .chain(self.fallbacks.iter().copied())
            .collect()
    }
}
