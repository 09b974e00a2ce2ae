//! StatRoute CLI
//!
//! Command-line interface for inspecting routing decisions and configuration

use anyhow::Context;
use clap::{Parser, Subcommand};
use statroute_cache::compute_key;
use statroute_core::{Provider, RouteInput};
use statroute_dispatch::DispatchConfig;
use statroute_observability::init_logging;
use statroute_routing::{CodeFormat, RegionResolver, RoutingEngine};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "statroute")]
#[command(about = "StatRoute - statistics provider dispatch", long_about = None)]
struct Cli {
    /// Configuration file (YAML or TOML)
    #[arg(long, global = true, env = "STATROUTE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the routing decision for a query
    Route {
        /// Natural-language query
        query: String,

        /// Indicator name (repeatable)
        #[arg(long = "indicator")]
        indicators: Vec<String>,

        /// Single target country
        #[arg(long)]
        country: Option<String>,

        /// Comma-separated target countries or regions
        #[arg(long, value_delimiter = ',')]
        countries: Vec<String>,

        /// Provider suggested by an upstream classifier
        #[arg(long)]
        hint: Option<String>,

        /// Routing tables file, overriding the configuration
        #[arg(long)]
        tables: Option<PathBuf>,
    },
    /// Load and validate the configuration and routing tables
    Validate {
        /// Routing tables file, overriding the configuration
        #[arg(long)]
        tables: Option<PathBuf>,
    },
    /// List the member countries of a region
    Expand {
        region: String,

        /// Print ISO 3166-1 alpha-3 codes instead of alpha-2
        #[arg(long, default_value = "false")]
        iso3: bool,
    },
    /// Print the response cache key for a provider and parameter object
    CacheKey {
        provider: String,

        /// Parameters as a JSON object
        params: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<DispatchConfig> {
    match path {
        Some(path) => DispatchConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(DispatchConfig::default()),
    }
}

fn build_engine(config: &DispatchConfig, tables: Option<PathBuf>) -> anyhow::Result<RoutingEngine> {
    let mut routing = config.routing.clone();
    if tables.is_some() {
        routing.tables_path = tables;
    }
    let tables = routing.load_tables()?;
    Ok(RoutingEngine::new(tables)?.with_default_provider(routing.default_provider))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Route {
            query,
            indicators,
            country,
            countries,
            hint,
            tables,
        } => {
            let engine = build_engine(&config, tables)?;
            let mut input = RouteInput::new(query)
                .with_indicators(indicators)
                .with_countries(countries);
            if let Some(country) = country {
                input = input.with_country(country);
            }
            if let Some(hint) = hint {
                input = input.with_hint(hint);
            }

            let decision = engine.route(&input);
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Commands::Validate { tables } => {
            config.validate()?;
            let engine = build_engine(&config, tables)?;
            tracing::info!(
                default_provider = %engine.default_provider(),
                "Configuration is valid"
            );
            println!("Configuration OK");
        }
        Commands::Expand { region, iso3 } => {
            let format = if iso3 { CodeFormat::Iso3 } else { CodeFormat::Iso2 };
            let members = RegionResolver::new().expand_region(&region, format);
            if members.is_empty() {
                anyhow::bail!("Unknown region '{}'", region);
            }
            println!("{}", members.join(","));
        }
        Commands::CacheKey { provider, params } => {
            let provider: Provider = provider.parse()?;
            let params: serde_json::Value =
                serde_json::from_str(&params).context("PARAMS_JSON is not valid JSON")?;
            println!("{}", compute_key(provider, &params));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_route_arguments() {
        let cli = Cli::try_parse_from([
            "statroute",
            "route",
            "gdp growth",
            "--indicator",
            "GDP",
            "--indicator",
            "growth",
            "--countries",
            "US,CA",
        ])
        .unwrap();

        match cli.command {
            Commands::Route {
                query,
                indicators,
                countries,
                country,
                ..
            } => {
                assert_eq!(query, "gdp growth");
                assert_eq!(indicators, vec!["GDP", "growth"]);
                assert_eq!(countries, vec!["US", "CA"]);
                assert!(country.is_none());
            }
            _ => panic!("expected route command"),
        }
    }

    #[test]
    fn test_build_engine_with_default_config() {
        let engine = build_engine(&DispatchConfig::default(), None).unwrap();
        assert_eq!(engine.default_provider(), Provider::WorldBank);
    }
}
