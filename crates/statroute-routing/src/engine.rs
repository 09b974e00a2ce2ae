//! Deterministic routing engine
//!
//! Maps a request onto a provider through a strict priority cascade. The
//! first stage that matches decides; every decision carries the provider's
//! static fallback chain. Routing is pure: no I/O, no shared mutable state,
//! and it never fails.

use statroute_core::{Catalog, MatchType, Provider, RouteInput, RoutingDecision};
use std::sync::Arc;

use crate::fallback::FallbackMap;
use crate::heuristics::Heuristics;
use crate::patterns::{PatternMatch, PatternMatcher};
use crate::region::{CodeFormat, RegionResolver};
use crate::tables::{BlocRule, RoutingTables, TableError};

pub struct RoutingEngine {
    matcher: PatternMatcher,
    heuristics: Heuristics,
    fallbacks: FallbackMap,
    resolver: RegionResolver,
    blocs: Vec<BlocRule>,
    major_economies: Vec<String>,
    default_provider: Provider,
    catalog: Option<Arc<dyn Catalog>>,
}

impl std::fmt::Debug for RoutingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingEngine")
            .field("default_provider", &self.default_provider)
            .field("blocs", &self.blocs)
            .field("has_catalog", &self.catalog.is_some())
            .finish()
    }
}

impl RoutingEngine {
    /// Build an engine from validated tables
    pub fn new(tables: RoutingTables) -> Result<Self, TableError> {
        let fallbacks = FallbackMap::from_tables(&tables)?;
        let resolver = RegionResolver::new();
        Ok(Self {
            matcher: PatternMatcher::new(&tables),
            heuristics: Heuristics::new(&tables),
            fallbacks,
            major_economies: tables
                .major_economies
                .iter()
                .map(|c| resolver.normalize(c))
                .collect(),
            resolver,
            blocs: tables.blocs,
            default_provider: tables.default_provider,
            catalog: None,
        })
    }

    /// Engine over the tables compiled into the binary
    pub fn embedded() -> Result<Self, TableError> {
        Self::new(RoutingTables::embedded()?)
    }

    /// Attach an indicator catalog (enables the catalog stage)
    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Override the provider used when nothing else matches
    pub fn with_default_provider(mut self, provider: Provider) -> Self {
        self.default_provider = provider;
        self
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn fallback_map(&self) -> &FallbackMap {
        &self.fallbacks
    }

    pub fn catalog(&self) -> Option<&Arc<dyn Catalog>> {
        self.catalog.as_ref()
    }

    pub fn default_provider(&self) -> Provider {
        self.default_provider
    }

    /// Route a request. Deterministic and side-effect free.
    pub fn route(&self, input: &RouteInput) -> RoutingDecision {
        let decision = self.cascade(input);
        tracing::debug!(
            provider = %decision.provider(),
            match_type = ?decision.match_type(),
            confidence = decision.confidence(),
            pattern = ?decision.matched_pattern(),
            "Routing decision"
        );
        decision
    }

    /// Independent explicit, indicator and region hits for the input
    pub fn pattern_hits(&self, input: &RouteInput) -> Vec<PatternMatch> {
        [
            self.matcher.detect_explicit_provider(&input.query),
            self.matcher
                .detect_indicator_provider(&input.query, &input.indicators),
            self.matcher.detect_region_provider(&input.query),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Catalog concept for an input: the first indicator, else the query,
    /// lowercased with non-alphanumeric runs collapsed to `_`
    pub fn concept_for(input: &RouteInput) -> String {
        let source = input
            .indicators
            .first()
            .map(String::as_str)
            .unwrap_or(&input.query);
        let mut concept = String::with_capacity(source.len());
        for c in source.trim().chars() {
            if c.is_alphanumeric() {
                concept.extend(c.to_lowercase());
            } else if !concept.ends_with('_') {
                concept.push('_');
            }
        }
        concept.trim_matches('_').to_string()
    }

    /// Normalized ISO2 codes from `country` and `countries`, groups expanded
    pub fn country_codes(&self, input: &RouteInput) -> Vec<String> {
        let mut codes: Vec<String> = Vec::new();
        for name in input.country.iter().chain(input.countries.iter()) {
            if name.trim().is_empty() {
                continue;
            }
            for code in self.resolver.expand_or_normalize(name, CodeFormat::Iso2) {
                if !codes.contains(&code) {
                    codes.push(code);
                }
            }
        }
        codes
    }

    fn decide(
        &self,
        provider: Provider,
        confidence: f64,
        match_type: MatchType,
        reasoning: impl Into<String>,
        pattern: Option<String>,
    ) -> RoutingDecision {
        let decision = RoutingDecision::new(provider, confidence, match_type, reasoning)
            .with_fallbacks(self.fallbacks.chain(provider).iter().copied());
        match pattern {
            Some(pattern) => decision.with_matched_pattern(pattern),
            None => decision,
        }
    }

    fn bloc_for_all(&self, codes: &[String]) -> Option<&BlocRule> {
        self.blocs.iter().find(|bloc| {
            codes
                .iter()
                .all(|code| self.resolver.is_member(code, &bloc.region))
        })
    }

    fn cascade(&self, input: &RouteInput) -> RoutingDecision {
        let mut lowered = input.query.to_lowercase();
        for indicator in &input.indicators {
            lowered.push(' ');
            lowered.push_str(&indicator.to_lowercase());
        }
        let codes = self.country_codes(input);

        // 1. Provider named outright
        if let Some(hit) = self.matcher.detect_explicit_provider(&input.query) {
            return self.decide(
                hit.provider,
                1.0,
                MatchType::Explicit,
                format!("Query names {} ('{}')", hit.provider, hit.pattern),
                Some(hit.pattern),
            );
        }

        // 2. Indicator families served by a single provider
        if let Some(hit) = self
            .matcher
            .detect_indicator_provider(&input.query, &input.indicators)
        {
            return self.decide(
                hit.provider,
                0.95,
                MatchType::Indicator,
                format!("Indicator '{}' is served by {}", hit.pattern, hit.provider),
                Some(hit.pattern),
            );
        }

        // 3. Ordered special cases
        if let Some(hit) = self.heuristics.evaluate(&lowered, &codes, &self.matcher) {
            let reasoning = hit.reasoning();
            return self.decide(
                hit.provider,
                hit.confidence,
                hit.match_type,
                reasoning,
                Some(hit.pattern),
            );
        }

        // 4. Country membership
        if !codes.is_empty() {
            if let Some(bloc) = self.bloc_for_all(&codes) {
                return self.decide(
                    bloc.provider,
                    0.8,
                    MatchType::Country,
                    format!("All countries are {} members", bloc.region),
                    Some(bloc.region.clone()),
                );
            }
            if let [code] = codes.as_slice() {
                if self.major_economies.contains(code) {
                    if let Some(term) = self.heuristics.mentions_fiscal(&lowered) {
                        return self.decide(
                            Provider::Imf,
                            0.8,
                            MatchType::Country,
                            format!("Fiscal question ('{}') for major economy {}", term, code),
                            Some(term.to_string()),
                        );
                    }
                }
                return self.decide(
                    Provider::WorldBank,
                    0.7,
                    MatchType::Country,
                    format!("Single country {} outside configured blocs", code),
                    None,
                );
            }
        }

        // 5. Catalog lookup
        if let Some(catalog) = &self.catalog {
            let concept = Self::concept_for(input);
            if !concept.is_empty() {
                if let Some(provider) = catalog.best_provider(&concept) {
                    return self.decide(
                        provider,
                        0.8,
                        MatchType::Catalog,
                        format!("Catalog prefers {} for '{}'", provider, concept),
                        Some(concept),
                    );
                }
            }
        }

        // 6. Several countries spanning blocs
        if codes.len() > 1 {
            let outside = codes.iter().find(|code| {
                !self
                    .blocs
                    .iter()
                    .any(|bloc| self.resolver.is_member(code, &bloc.region))
            });
            if let Some(code) = outside {
                return self.decide(
                    Provider::WorldBank,
                    0.7,
                    MatchType::Country,
                    format!("{} countries, {} outside every bloc", codes.len(), code),
                    None,
                );
            }
        }

        // 7. Caller hint, after the misrouting pass
        if let Some(hint) = input.external_hint.as_deref() {
            match hint.parse::<Provider>() {
                Ok(hinted) => {
                    let (provider, correction) =
                        self.matcher
                            .correct_misrouting(hinted, &input.query, &input.indicators);
                    let reasoning = match &correction {
                        Some(name) => format!(
                            "Caller hint {} corrected to {} ({})",
                            hinted, provider, name
                        ),
                        None => format!("Caller hint {}", hinted),
                    };
                    return self.decide(provider, 0.7, MatchType::Default, reasoning, correction);
                }
                Err(e) => {
                    tracing::debug!(hint = %hint, error = %e, "Ignoring unknown provider hint");
                }
            }
        }

        // 8. Nothing matched
        self.decide(
            self.default_provider,
            0.5,
            MatchType::Default,
            "No routing rule matched",
            None,
        )
    }
}
