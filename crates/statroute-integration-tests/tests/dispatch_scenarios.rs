//! End-to-end dispatch scenarios
//!
//! Each test builds a dispatcher from a YAML configuration, plugs in test
//! adapters and drives it through routing, admission and caching.

mod common;

use common::{FixedOracle, TestAdapter};
use statroute_cache::ResponseCache;
use statroute_core::{DataQuery, Error, Frequency, MatchType, Provider};
use statroute_dispatch::{DispatchConfig, Dispatcher, DispatcherBuilder};
use statroute_observability::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn config(yaml: &str) -> DispatchConfig {
    let config: DispatchConfig = serde_yaml::from_str(yaml).unwrap();
    config.validate().unwrap();
    config
}

fn build(config: DispatchConfig, adapters: &[&TestAdapter]) -> Dispatcher {
    adapters
        .iter()
        .fold(DispatcherBuilder::new(config), |builder, adapter| {
            builder.with_adapter(adapter.shared())
        })
        .with_metrics(Metrics::new().unwrap())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_crypto_query_with_fiscal_indicators_goes_to_coingecko() {
    let coingecko = TestAdapter::new(Provider::CoinGecko);
    let imf = TestAdapter::new(Provider::Imf);
    let dispatcher = build(DispatchConfig::default(), &[&coingecko, &imf]);

    let query = DataQuery::new("bitcoin price")
        .with_indicator("government debt")
        .with_indicator("deficit");
    let outcome = dispatcher.fetch(&query).await.unwrap();

    assert_eq!(outcome.provider, Provider::CoinGecko);
    assert_eq!(outcome.decision.match_type(), MatchType::Explicit);
    assert_eq!(outcome.value["provider"], "COINGECKO");
    assert_eq!(coingecko.get_call_count(), 1);
    assert_eq!(imf.get_call_count(), 0);
}

#[tokio::test]
async fn test_oracle_crypto_choice_for_deficit_is_corrected_to_imf() {
    let coingecko = TestAdapter::new(Provider::CoinGecko);
    let imf = TestAdapter::new(Provider::Imf);
    let oracle = Arc::new(FixedOracle::choosing("COINGECKO"));

    let dispatcher = DispatcherBuilder::new(config(
        "hybrid:\n  enabled: true\n  max_candidates: 10\n",
    ))
    .with_adapter(coingecko.shared())
    .with_adapter(imf.shared())
    .with_oracle(oracle.clone())
    .build()
    .unwrap();

    let outcome = dispatcher
        .fetch(&DataQuery::new("government deficit"))
        .await
        .unwrap();

    assert_eq!(oracle.get_call_count(), 1);
    assert_eq!(outcome.provider, Provider::Imf);
    assert_eq!(outcome.decision.match_type(), MatchType::Llm);
    assert_eq!(
        outcome.decision.matched_pattern(),
        Some("crypto_provider_for_macro_query")
    );
    assert_eq!(coingecko.get_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_third_rapid_call_waits_for_minute_window() {
    let fred = TestAdapter::new(Provider::Fred);
    let dispatcher = build(
        config("admission:\n  providers:\n    FRED: { max_per_minute: 2 }\n"),
        &[&fred],
    );

    let start = Instant::now();
    for series in ["UNRATE", "PAYEMS"] {
        let query = DataQuery::new("FRED series").with_param("series_id", series);
        dispatcher.fetch(&query).await.unwrap();
    }
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(dispatcher.admission().delay_until_ready(Provider::Fred) > Duration::ZERO);

    let query = DataQuery::new("FRED series").with_param("series_id", "CPIAUCSL");
    let outcome = dispatcher.fetch(&query).await.unwrap();
    assert_eq!(outcome.provider, Provider::Fred);
    assert!(start.elapsed() >= Duration::from_secs(60));
    assert_eq!(fred.get_call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_rate_limits_escalate_to_longest_cooldown() {
    let imf = TestAdapter::new(Provider::Imf);
    imf.set_rate_limited(true);
    let dispatcher = build(DispatchConfig::default(), &[&imf]);
    let query = DataQuery::new("IMF government debt");

    let expected = [60, 120, 300, 600, 600];
    for (i, secs) in expected.iter().enumerate() {
        let result = dispatcher.fetch(&query).await;
        assert!(matches!(result, Err(Error::AllProvidersFailed { .. })));

        let status = dispatcher.admission().circuit_status(Provider::Imf);
        assert!(status.open);
        assert_eq!(status.consecutive_failures, i as u32 + 1);
        assert_eq!(status.cooldown_remaining, Duration::from_secs(*secs));

        if i + 1 < expected.len() {
            tokio::time::advance(status.cooldown_remaining).await;
            assert!(!dispatcher.admission().is_circuit_open(Provider::Imf));
        }
    }
    assert_eq!(imf.get_call_count(), 5);

    // While open the provider is skipped without a call
    assert!(dispatcher.fetch(&query).await.is_err());
    assert_eq!(imf.get_call_count(), 5);

    // A success after the cooldown resets the breaker
    tokio::time::advance(Duration::from_secs(600)).await;
    imf.set_rate_limited(false);
    dispatcher.fetch(&query).await.unwrap();
    let status = dispatcher.admission().circuit_status(Provider::Imf);
    assert_eq!(status.consecutive_failures, 0);
    assert!(!status.open);
}

#[tokio::test(start_paused = true)]
async fn test_cache_entry_expires_after_ttl() {
    let cache: ResponseCache = ResponseCache::with_defaults();
    cache.set("k", serde_json::json!("v"), Duration::from_secs(1));
    assert_eq!(cache.get("k"), Some(serde_json::json!("v")));

    tokio::time::advance(Duration::from_millis(1100)).await;
    assert_eq!(cache.get("k"), None);
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_cache_follows_frequency_ttl() {
    let fred = TestAdapter::new(Provider::Fred);
    let dispatcher = build(DispatchConfig::default(), &[&fred]);
    let query = DataQuery::new("FRED fed funds rate").with_frequency(Frequency::Daily);

    assert!(!dispatcher.fetch(&query).await.unwrap().from_cache);
    tokio::time::advance(Duration::from_secs(3599)).await;
    assert!(dispatcher.fetch(&query).await.unwrap().from_cache);
    assert_eq!(fred.get_call_count(), 1);

    // Daily series live for one hour
    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(!dispatcher.fetch(&query).await.unwrap().from_cache);
    assert_eq!(fred.get_call_count(), 2);
}

#[tokio::test]
async fn test_fallback_chain_and_metrics() {
    let coingecko = TestAdapter::new(Provider::CoinGecko);
    let exchange = TestAdapter::new(Provider::ExchangeRate);
    coingecko.set_should_fail(true);
    let dispatcher = build(DispatchConfig::default(), &[&coingecko, &exchange]);

    let outcome = dispatcher
        .fetch(&DataQuery::new("bitcoin price in usd"))
        .await
        .unwrap();
    assert_eq!(outcome.provider, Provider::ExchangeRate);
    assert_eq!(
        outcome.attempts,
        vec![Provider::CoinGecko, Provider::ExchangeRate]
    );

    // Ordinary upstream errors leave the breaker closed
    assert!(!dispatcher.admission().is_circuit_open(Provider::CoinGecko));

    let text = dispatcher.metrics().unwrap().gather_text().unwrap();
    assert!(text.contains(
        r#"statroute_provider_outcomes_total{outcome="error",provider="COINGECKO"} 1"#
    ));
    assert!(text.contains(
        r#"statroute_provider_outcomes_total{outcome="success",provider="EXCHANGERATE"} 1"#
    ));
    assert!(text.contains(
        r#"statroute_fallback_triggered_total{from_provider="COINGECKO",reason="error",to_provider="EXCHANGERATE"} 1"#
    ));
}

#[tokio::test]
async fn test_batch_fetch_across_countries() {
    let worldbank = TestAdapter::new(Provider::WorldBank);
    let dispatcher = build(
        config("batch:\n  max_concurrency: 2\n"),
        &[&worldbank],
    );

    let countries: Vec<String> = ["Kenya", "Peru", "Vietnam"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    let outcome = dispatcher
        .fetch_batch(&DataQuery::new("population"), &countries)
        .await
        .unwrap();

    assert_eq!(outcome.successes.len(), 3);
    assert!(outcome.failures.is_empty());
    for (country, fetched) in &outcome.successes {
        assert_eq!(fetched.provider, Provider::WorldBank);
        assert_eq!(fetched.value["country"], country.as_str());
    }
    assert_eq!(worldbank.get_call_count(), 3);
}
