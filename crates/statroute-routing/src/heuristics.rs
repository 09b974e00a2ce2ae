//! Special-case heuristics
//!
//! Evaluated in a fixed order after the explicit and indicator tables. Each
//! heuristic is a predicate over the lowercased query and indicator text;
//! the first one that fires decides.

use statroute_core::{MatchType, Provider};
use std::collections::BTreeMap;

use crate::patterns::{Keyword, PatternMatcher, first_match};
use crate::tables::RoutingTables;

/// A heuristic that fired
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicHit {
    pub provider: Provider,
    pub confidence: f64,
    pub match_type: MatchType,
    /// Heuristic name, for logs and reasoning
    pub name: &'static str,
    /// Keyword that triggered it
    pub pattern: String,
}

impl HeuristicHit {
    fn new(
        name: &'static str,
        provider: Provider,
        confidence: f64,
        match_type: MatchType,
        pattern: &str,
    ) -> Self {
        Self {
            provider,
            confidence,
            match_type,
            name,
            pattern: pattern.to_string(),
        }
    }

    pub fn reasoning(&self) -> String {
        format!(
            "Heuristic '{}' matched '{}' -> {}",
            self.name, self.pattern, self.provider
        )
    }
}

/// Compiled heuristic vocabulary
#[derive(Debug, Clone)]
pub struct Heuristics {
    exchange_rate: Vec<Keyword>,
    effective_exchange_rate: Vec<Keyword>,
    trade_terms: Vec<Keyword>,
    ratio_markers: Vec<Keyword>,
    trade_flow: Vec<Keyword>,
    forecast: Vec<Keyword>,
    property_price: Vec<Keyword>,
    macro_terms: Vec<Keyword>,
    fiscal: Vec<Keyword>,
    national_agencies: BTreeMap<String, Provider>,
}

impl Heuristics {
    pub fn new(tables: &RoutingTables) -> Self {
        let vocab = &tables.heuristics;
        Self {
            exchange_rate: Keyword::compile_all(&vocab.exchange_rate),
            effective_exchange_rate: Keyword::compile_all(&vocab.effective_exchange_rate),
            trade_terms: Keyword::compile_all(&vocab.trade_terms),
            ratio_markers: Keyword::compile_all(&vocab.ratio_markers),
            trade_flow: Keyword::compile_all(&vocab.trade_flow),
            forecast: Keyword::compile_all(&vocab.forecast),
            property_price: Keyword::compile_all(&vocab.property_price),
            macro_terms: Keyword::compile_all(&vocab.macro_terms),
            fiscal: Keyword::compile_all(&vocab.fiscal),
            national_agencies: tables
                .national_agencies
                .iter()
                .map(|(code, provider)| (code.to_uppercase(), *provider))
                .collect(),
        }
    }

    /// Whether the text carries fiscal or debt vocabulary
    pub fn mentions_fiscal(&self, lowered: &str) -> Option<&str> {
        first_match(&self.fiscal, lowered)
    }

    /// Run the heuristics in order.
    ///
    /// `lowered` is the lowercased query joined with the indicator hints;
    /// `countries` holds the normalized ISO2 codes supplied with the request.
    pub fn evaluate(
        &self,
        lowered: &str,
        countries: &[String],
        matcher: &PatternMatcher,
    ) -> Option<HeuristicHit> {
        // Exchange rates; effective rates are a BIS series
        if let Some(pattern) = first_match(&self.effective_exchange_rate, lowered) {
            return Some(HeuristicHit::new(
                "effective_exchange_rate",
                Provider::Bis,
                0.9,
                MatchType::Indicator,
                pattern,
            ));
        }
        if let Some(pattern) = first_match(&self.exchange_rate, lowered) {
            return Some(HeuristicHit::new(
                "exchange_rate",
                Provider::ExchangeRate,
                0.9,
                MatchType::Indicator,
                pattern,
            ));
        }

        // Trade as a ratio of output is a development indicator, not a flow
        if let Some(term) = first_match(&self.trade_terms, lowered) {
            if let Some(marker) = first_match(&self.ratio_markers, lowered) {
                return Some(HeuristicHit::new(
                    "trade_ratio",
                    Provider::WorldBank,
                    0.88,
                    MatchType::Indicator,
                    &format!("{} + {}", term, marker),
                ));
            }
        }

        if let Some(pattern) = first_match(&self.forecast, lowered) {
            return Some(HeuristicHit::new(
                "forecast",
                Provider::Imf,
                0.85,
                MatchType::Indicator,
                pattern,
            ));
        }

        if let Some(pattern) = first_match(&self.property_price, lowered) {
            return Some(HeuristicHit::new(
                "property_price",
                Provider::Bis,
                0.88,
                MatchType::Indicator,
                pattern,
            ));
        }

        if let Some(pattern) = first_match(&self.trade_flow, lowered) {
            return Some(HeuristicHit::new(
                "trade_flow",
                Provider::Comtrade,
                0.85,
                MatchType::Indicator,
                pattern,
            ));
        }

        if let Some(term) = first_match(&self.macro_terms, lowered) {
            if let Some(region) = matcher.detect_region_provider(lowered) {
                return Some(HeuristicHit::new(
                    "regional_macro",
                    region.provider,
                    0.85,
                    MatchType::Region,
                    &format!("{} + {}", region.pattern, term),
                ));
            }
            if let [code] = countries {
                if let Some(agency) = self.national_agencies.get(code) {
                    return Some(HeuristicHit::new(
                        "national_macro",
                        *agency,
                        0.85,
                        MatchType::Region,
                        &format!("{} + {}", code, term),
                    ));
                }
            }
        }

        // Aggregate fiscal questions with no country are IMF territory
        if countries.is_empty() {
            if let Some(pattern) = self.mentions_fiscal(lowered) {
                return Some(HeuristicHit::new(
                    "fiscal_aggregate",
                    Provider::Imf,
                    0.85,
                    MatchType::Indicator,
                    pattern,
                ));
            }
        }

        None
    }
}
