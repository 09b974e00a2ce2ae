//! Keyword tables compiled for matching
//!
//! Implements the text scans the routing cascade is built from:
//! - Explicit provider mentions ("according to the IMF")
//! - Indicator families only one provider serves
//! - Region phrases ("euro area")
//! - Anti-misrouting corrections applied to an already chosen provider

use regex::Regex;
use statroute_core::{MatchType, Provider};

use crate::tables::{AntiPattern, RoutingTables};

/// A single compiled keyword
#[derive(Debug, Clone)]
pub enum Keyword {
    /// Plain containment on lowercased text
    Substring(String),
    /// Short alphanumeric token matched on word boundaries
    WordBoundary { text: String, regex: Regex },
}

impl Keyword {
    /// Compile a table keyword. Alphanumeric tokens of four characters or
    /// fewer get word boundaries so "eth" does not match "method".
    pub fn compile(raw: &str) -> Self {
        let text = raw.trim().to_lowercase();
        let short_token =
            text.chars().count() <= 4 && text.chars().all(|c| c.is_alphanumeric());
        if short_token {
            match Regex::new(&format!(r"\b{}\b", regex::escape(&text))) {
                Ok(regex) => return Keyword::WordBoundary { text, regex },
                Err(e) => {
                    tracing::warn!(keyword = %text, error = %e, "Falling back to substring match");
                }
            }
        }
        Keyword::Substring(text)
    }

    pub fn compile_all(raw: &[String]) -> Vec<Keyword> {
        raw.iter().map(|k| Keyword::compile(k)).collect()
    }

    pub fn as_str(&self) -> &str {
        match self {
            Keyword::Substring(text) => text,
            Keyword::WordBoundary { text, .. } => text,
        }
    }

    /// `lowered` must already be lowercase
    pub fn is_match(&self, lowered: &str) -> bool {
        match self {
            Keyword::Substring(text) => lowered.contains(text.as_str()),
            Keyword::WordBoundary { regex, .. } => regex.is_match(lowered),
        }
    }
}

/// First keyword in `keywords` found in `lowered`
pub fn first_match<'a>(keywords: &'a [Keyword], lowered: &str) -> Option<&'a str> {
    keywords
        .iter()
        .find(|k| k.is_match(lowered))
        .map(Keyword::as_str)
}

/// Provider detected by one of the keyword tables
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub provider: Provider,
    /// The keyword that fired
    pub pattern: String,
    pub match_type: MatchType,
}

#[derive(Debug, Clone)]
struct Rule {
    provider: Provider,
    keywords: Vec<Keyword>,
}

#[derive(Debug, Clone)]
struct Correction {
    name: String,
    from: Provider,
    to: Provider,
    when_any: Vec<Keyword>,
    unless_any: Vec<Keyword>,
}

impl From<&AntiPattern> for Correction {
    fn from(pattern: &AntiPattern) -> Self {
        Self {
            name: pattern.name.clone(),
            from: pattern.from,
            to: pattern.to,
            when_any: Keyword::compile_all(&pattern.when_any),
            unless_any: Keyword::compile_all(&pattern.unless_any),
        }
    }
}

/// Ordered keyword tables. All operations are pure and total.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    explicit: Vec<Rule>,
    indicators: Vec<Rule>,
    regions: Vec<Rule>,
    corrections: Vec<Correction>,
}

impl PatternMatcher {
    pub fn new(tables: &RoutingTables) -> Self {
        let explicit = tables
            .explicit
            .iter()
            .map(|r| Rule {
                provider: r.provider,
                keywords: Keyword::compile_all(&r.phrases),
            })
            .collect();
        let indicators = tables
            .indicators
            .iter()
            .map(|r| Rule {
                provider: r.provider,
                keywords: Keyword::compile_all(&r.keywords),
            })
            .collect();
        let regions = tables
            .regions
            .iter()
            .map(|r| Rule {
                provider: r.provider,
                keywords: Keyword::compile_all(&r.phrases),
            })
            .collect();
        let corrections = tables.anti_patterns.iter().map(Correction::from).collect();

        Self {
            explicit,
            indicators,
            regions,
            corrections,
        }
    }

    /// Provider named outright in the text
    pub fn detect_explicit_provider(&self, text: &str) -> Option<PatternMatch> {
        let lowered = text.to_lowercase();
        scan(&self.explicit, &[lowered.as_str()], MatchType::Explicit)
    }

    /// Indicator family found in the text or in any of the structured hints
    pub fn detect_indicator_provider(&self, text: &str, hints: &[String]) -> Option<PatternMatch> {
        let mut haystacks = vec![text.to_lowercase()];
        haystacks.extend(hints.iter().map(|h| h.to_lowercase()));
        let refs: Vec<&str> = haystacks.iter().map(String::as_str).collect();
        scan(&self.indicators, &refs, MatchType::Indicator)
    }

    /// Region phrase found in the text
    pub fn detect_region_provider(&self, text: &str) -> Option<PatternMatch> {
        let lowered = text.to_lowercase();
        scan(&self.regions, &[lowered.as_str()], MatchType::Region)
    }

    /// Apply the first anti-pattern that fires for `provider`.
    ///
    /// Returns the (possibly unchanged) provider and the name of the
    /// correction applied.
    pub fn correct_misrouting(
        &self,
        provider: Provider,
        text: &str,
        hints: &[String],
    ) -> (Provider, Option<String>) {
        let mut combined = text.to_lowercase();
        for hint in hints {
            combined.push(' ');
            combined.push_str(&hint.to_lowercase());
        }

        for correction in self.corrections.iter().filter(|c| c.from == provider) {
            let triggered = first_match(&correction.when_any, &combined).is_some();
            let excused = first_match(&correction.unless_any, &combined).is_some();
            if triggered && !excused {
                tracing::debug!(
                    from = %correction.from,
                    to = %correction.to,
                    correction = %correction.name,
                    "Corrected misrouted provider"
                );
                return (correction.to, Some(correction.name.clone()));
            }
        }
        (provider, None)
    }
}

/// Rules in table order, then keywords in rule order; first hit wins
fn scan(rules: &[Rule], haystacks: &[&str], match_type: MatchType) -> Option<PatternMatch> {
    for rule in rules {
        for keyword in &rule.keywords {
            if haystacks.iter().any(|h| keyword.is_match(h)) {
                return Some(PatternMatch {
                    provider: rule.provider,
                    pattern: keyword.as_str().to_string(),
                    match_type,
                });
            }
        }
    }
    None
}
