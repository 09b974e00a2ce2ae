//! Versioned routing tables
//!
//! Keyword tables, the fallback map and the country rules are data, not
//! code. A default set is embedded at compile time from
//! `config/routing_tables.yaml`; deployments can point at their own file.
//! Tables are validated once at load time.

use serde::{Deserialize, Serialize};
use statroute_core::Provider;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::fallback::FallbackMap;

/// Table format version understood by this build
pub const SUPPORTED_VERSION: u32 = 1;

const EMBEDDED_TABLES: &str = include_str!("../config/routing_tables.yaml");

/// Provider plus the phrases that select it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseRule {
    pub provider: Provider,
    #[serde(alias = "keywords")]
    pub phrases: Vec<String>,
}

/// Indicator family that only one provider serves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRule {
    pub provider: Provider,
    pub keywords: Vec<String>,
}

/// Correction applied when a provider was chosen for the wrong kind of query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntiPattern {
    pub name: String,
    pub from: Provider,
    pub to: Provider,
    /// Fires only if the text contains at least one of these
    pub when_any: Vec<String>,
    /// ...and none of these
    #[serde(default)]
    pub unless_any: Vec<String>,
}

/// A bloc whose members are served by the bloc's statistical agency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlocRule {
    /// Group name understood by the region resolver ("EU")
    pub region: String,
    pub provider: Provider,
}

/// Vocabulary used by the special-case heuristics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeuristicVocabulary {
    #[serde(default)]
    pub exchange_rate: Vec<String>,
    #[serde(default)]
    pub effective_exchange_rate: Vec<String>,
    #[serde(default)]
    pub trade_terms: Vec<String>,
    #[serde(default)]
    pub ratio_markers: Vec<String>,
    #[serde(default)]
    pub trade_flow: Vec<String>,
    #[serde(default)]
    pub forecast: Vec<String>,
    #[serde(default)]
    pub property_price: Vec<String>,
    #[serde(default, rename = "macro")]
    pub macro_terms: Vec<String>,
    #[serde(default)]
    pub fiscal: Vec<String>,
}

/// Complete set of routing tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingTables {
    pub version: u32,
    pub default_provider: Provider,
    #[serde(default = "default_max_fallbacks")]
    pub max_fallbacks: usize,
    pub fallbacks: BTreeMap<Provider, Vec<Provider>>,
    #[serde(default)]
    pub terminal_fallbacks: Vec<Provider>,
    #[serde(default)]
    pub explicit: Vec<PhraseRule>,
    #[serde(default)]
    pub indicators: Vec<IndicatorRule>,
    #[serde(default)]
    pub regions: Vec<PhraseRule>,
    /// National statistics agency per ISO2 country code
    #[serde(default)]
    pub national_agencies: BTreeMap<String, Provider>,
    #[serde(default)]
    pub anti_patterns: Vec<AntiPattern>,
    #[serde(default)]
    pub heuristics: HeuristicVocabulary,
    #[serde(default)]
    pub blocs: Vec<BlocRule>,
    #[serde(default)]
    pub major_economies: Vec<String>,
}

fn default_max_fallbacks() -> usize {
    4
}

/// Routing table load and validation errors
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to read routing tables: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid routing tables: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Unsupported routing table version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Provider {0} lists itself as a fallback")]
    SelfFallback(Provider),

    #[error("Provider {provider} lists fallback {fallback} more than once")]
    DuplicateFallback { provider: Provider, fallback: Provider },

    #[error("Fallback cycle: {}", path.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(" -> "))]
    FallbackCycle { path: Vec<Provider> },

    #[error("terminal_fallbacks needs at least two distinct providers, found {0}")]
    TerminalTooShort(usize),

    #[error("max_fallbacks must be at least 1")]
    ZeroMaxFallbacks,

    #[error("Empty keyword in {table} table")]
    EmptyKeyword { table: &'static str },

    #[error("Keyword '{keyword}' in {table} table maps to both {first} and {second}")]
    AmbiguousKeyword {
        table: &'static str,
        keyword: String,
        first: Provider,
        second: Provider,
    },

    #[error("Keyword '{keyword}' appears twice for {provider} in {table} table")]
    DuplicateKeyword {
        table: &'static str,
        keyword: String,
        provider: Provider,
    },

    #[error("Unknown region '{0}' in bloc rules")]
    UnknownBloc(String),
}

impl RoutingTables {
    /// Tables compiled into the binary
    pub fn embedded() -> Result<Self, TableError> {
        Self::from_yaml_str(EMBEDDED_TABLES)
    }

    /// Parse and validate tables from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self, TableError> {
        let tables: RoutingTables = serde_yaml::from_str(yaml)?;
        tables.validate()?;
        Ok(tables)
    }

    /// Parse and validate tables from a YAML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let tables = Self::from_yaml_str(&contents)?;
        tracing::info!(
            path = %path.as_ref().display(),
            version = tables.version,
            "Loaded routing tables"
        );
        Ok(tables)
    }

    /// Check version, fallback graph and keyword tables
    pub fn validate(&self) -> Result<(), TableError> {
        if self.version != SUPPORTED_VERSION {
            return Err(TableError::UnsupportedVersion {
                found: self.version,
                expected: SUPPORTED_VERSION,
            });
        }

        // Building the map runs the graph checks
        FallbackMap::from_tables(self)?;

        check_phrase_table(
            "explicit",
            self.explicit.iter().map(|r| (r.provider, &r.phrases)),
        )?;
        check_phrase_table(
            "indicators",
            self.indicators.iter().map(|r| (r.provider, &r.keywords)),
        )?;
        check_phrase_table("regions", self.regions.iter().map(|r| (r.provider, &r.phrases)))?;

        for pattern in &self.anti_patterns {
            if pattern
                .when_any
                .iter()
                .chain(pattern.unless_any.iter())
                .any(|k| k.trim().is_empty())
            {
                return Err(TableError::EmptyKeyword {
                    table: "anti_patterns",
                });
            }
        }

        let resolver = crate::region::RegionResolver::new();
        for bloc in &self.blocs {
            if resolver.group_code(&bloc.region).is_none() {
                return Err(TableError::UnknownBloc(bloc.region.clone()));
            }
        }

        Ok(())
    }
}

/// Reject empty keywords, and keywords that appear twice in one table
/// (same provider: duplicate, different provider: ambiguous).
fn check_phrase_table<'a, I>(table: &'static str, rules: I) -> Result<(), TableError>
where
    I: Iterator<Item = (Provider, &'a Vec<String>)>,
{
    let mut seen: HashMap<String, Provider> = HashMap::new();
    for (provider, phrases) in rules {
        for phrase in phrases {
            let key = phrase.trim().to_lowercase();
            if key.is_empty() {
                return Err(TableError::EmptyKeyword { table });
            }
            match seen.get(&key) {
                Some(first) if *first == provider => {
                    return Err(TableError::DuplicateKeyword {
                        table,
                        keyword: key,
                        provider,
                    });
                }
                Some(first) => {
                    return Err(TableError::AmbiguousKeyword {
                        table,
                        keyword: key,
                        first: *first,
                        second: provider,
                    });
                }
                None => {
                    seen.insert(key, provider);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml(extra: &str) -> String {
        format!(
            "version: 1\ndefault_provider: WORLDBANK\nfallbacks:\n  IMF: [WORLDBANK]\n  WORLDBANK: []\nterminal_fallbacks: [IMF, OECD]\n{}",
            extra
        )
    }

    #[test]
    fn test_embedded_tables_are_valid() {
        let tables = RoutingTables::embedded().unwrap();
        assert_eq!(tables.version, SUPPORTED_VERSION);
        assert_eq!(tables.default_provider, Provider::WorldBank);
        assert!(!tables.explicit.is_empty());
        assert!(!tables.indicators.is_empty());
        assert!(!tables.heuristics.macro_terms.is_empty());
        assert_eq!(tables.national_agencies.get("CA"), Some(&Provider::StatsCan));
    }

    #[test]
    fn test_embedded_tables_cover_every_provider() {
        let tables = RoutingTables::embedded().unwrap();
        for provider in Provider::ALL {
            assert!(
                tables.fallbacks.contains_key(&provider),
                "no fallback entry for {}",
                provider
            );
        }
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let yaml = minimal_yaml("").replace("version: 1", "version: 2");
        let err = RoutingTables::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(
            err,
            TableError::UnsupportedVersion { found: 2, expected: 1 }
        ));
    }

    #[test]
    fn test_rejects_ambiguous_keyword() {
        let yaml = minimal_yaml(
            "explicit:\n  - provider: IMF\n    phrases: [\"weo\"]\n  - provider: OECD\n    phrases: [\"WEO\"]\n",
        );
        let err = RoutingTables::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, TableError::AmbiguousKeyword { .. }));
        assert!(err.to_string().contains("weo"));
    }

    #[test]
    fn test_rejects_duplicate_keyword() {
        let yaml = minimal_yaml(
            "indicators:\n  - provider: IMF\n    keywords: [\"primary balance\", \"primary balance\"]\n",
        );
        let err = RoutingTables::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, TableError::DuplicateKeyword { .. }));
    }

    #[test]
    fn test_rejects_empty_keyword() {
        let yaml = minimal_yaml("regions:\n  - provider: OECD\n    phrases: [\"  \"]\n");
        let err = RoutingTables::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, TableError::EmptyKeyword { table: "regions" }));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let yaml = minimal_yaml("explicit:\n  - provider: BLOOMBERG\n    phrases: [\"terminal\"]\n");
        assert!(matches!(
            RoutingTables::from_yaml_str(&yaml),
            Err(TableError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_bloc() {
        let yaml = minimal_yaml("blocs:\n  - region: ATLANTIS\n    provider: OECD\n");
        assert!(matches!(
            RoutingTables::from_yaml_str(&yaml),
            Err(TableError::UnknownBloc(_))
        ));
    }

    #[test]
    fn test_rejects_fallback_cycle() {
        let yaml = "version: 1\ndefault_provider: WORLDBANK\nfallbacks:\n  IMF: [OECD]\n  OECD: [WORLDBANK]\n  WORLDBANK: [IMF]\nterminal_fallbacks: [IMF, OECD]\n";
        let err = RoutingTables::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, TableError::FallbackCycle { .. }));
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.yaml");
        std::fs::write(&path, minimal_yaml("")).unwrap();

        let tables = RoutingTables::from_path(&path).unwrap();
        assert_eq!(tables.max_fallbacks, 4);
        assert!(tables.explicit.is_empty());

        assert!(matches!(
            RoutingTables::from_path(dir.path().join("missing.yaml")),
            Err(TableError::Io(_))
        ));
    }
}
