//! Builds a dispatcher and its shared components from configuration

use statroute_admission::AdmissionControl;
use statroute_cache::ResponseCache;
use statroute_core::{Catalog, Error, ProviderAdapter, RankingOracle, Result};
use statroute_observability::Metrics;
use statroute_routing::{HybridRanker, RoutingEngine};
use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::dispatcher::Dispatcher;

/// Assembles a [`Dispatcher`] from a [`DispatchConfig`] plus the
/// collaborators that live outside this workspace
pub struct DispatcherBuilder {
    config: DispatchConfig,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    oracle: Option<Arc<dyn RankingOracle>>,
    catalog: Option<Arc<dyn Catalog>>,
    metrics: Option<Metrics>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            adapters: Vec::new(),
            oracle: None,
            catalog: None,
            metrics: None,
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Oracle used when `hybrid.enabled` is set
    pub fn with_oracle(mut self, oracle: Arc<dyn RankingOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration, load routing tables and wire everything up
    pub fn build(self) -> Result<Dispatcher> {
        self.config.validate()?;

        let tables = self.config.routing.load_tables()?;
        let mut engine = RoutingEngine::new(tables)
            .map_err(|e| Error::ConfigValidation(format!("routing tables: {}", e)))?
            .with_default_provider(self.config.routing.default_provider);
        if let Some(catalog) = self.catalog {
            engine = engine.with_catalog(catalog);
        }
        let engine = Arc::new(engine);

        let admission = Arc::new(AdmissionControl::new(self.config.admission.clone()));
        let cache = Arc::new(ResponseCache::new(self.config.cache.clone()));

        let mut dispatcher = Dispatcher::new(engine.clone(), admission, cache)
            .with_batch_config(self.config.batch.clone());

        let hybrid = match (self.config.hybrid.enabled, self.oracle) {
            (true, Some(oracle)) => {
                dispatcher = dispatcher.with_ranker(HybridRanker::new(
                    engine,
                    oracle,
                    self.config.hybrid.clone(),
                ));
                true
            }
            (true, None) => {
                tracing::warn!("Hybrid routing enabled but no oracle provided, using deterministic routing");
                false
            }
            (false, _) => false,
        };

        let adapter_count = self.adapters.len();
        for adapter in self.adapters {
            dispatcher = dispatcher.with_adapter(adapter);
        }
        if let Some(metrics) = self.metrics {
            dispatcher = dispatcher.with_metrics(metrics);
        }

        tracing::info!(
            adapters = adapter_count,
            hybrid,
            default_provider = %self.config.routing.default_provider,
            "Dispatcher initialized"
        );
        Ok(dispatcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use statroute_core::{
        DataQuery, MatchType, OracleError, Provider, RankRequest, RankResult,
    };
    use std::path::PathBuf;

    mock! {
        pub Oracle {}

        #[async_trait::async_trait]
        impl RankingOracle for Oracle {
            async fn rank(&self, request: &RankRequest) -> std::result::Result<RankResult, OracleError>;
        }
    }

    fn imf_oracle() -> Arc<dyn RankingOracle> {
        let mut oracle = MockOracle::new();
        oracle.expect_rank().returning(|_| {
            Ok(RankResult {
                provider: "IMF".to_string(),
                confidence: 0.9,
                reasoning: "macro series".to_string(),
                fallbacks: vec![],
            })
        });
        Arc::new(oracle)
    }

    // Matches no routing rule
    fn unmatched() -> DataQuery {
        DataQuery::new("zzzz")
    }

    #[tokio::test]
    async fn test_default_provider_override() {
        let mut config = DispatchConfig::default();
        config.routing.default_provider = Provider::Oecd;

        let dispatcher = DispatcherBuilder::new(config).build().unwrap();
        let decision = dispatcher.route(&unmatched()).await;
        assert_eq!(decision.provider(), Provider::Oecd);
        assert_eq!(decision.match_type(), MatchType::Default);
    }

    #[tokio::test]
    async fn test_hybrid_enabled_uses_oracle() {
        let mut config = DispatchConfig::default();
        config.hybrid.enabled = true;

        let dispatcher = DispatcherBuilder::new(config)
            .with_oracle(imf_oracle())
            .build()
            .unwrap();
        let decision = dispatcher.route(&unmatched()).await;
        assert_eq!(decision.provider(), Provider::Imf);
        assert_eq!(decision.match_type(), MatchType::Llm);
    }

    #[tokio::test]
    async fn test_oracle_ignored_when_hybrid_disabled() {
        let dispatcher = DispatcherBuilder::new(DispatchConfig::default())
            .with_oracle(imf_oracle())
            .build()
            .unwrap();
        let decision = dispatcher.route(&unmatched()).await;
        assert_eq!(decision.provider(), Provider::WorldBank);
        assert_eq!(decision.match_type(), MatchType::Default);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = DispatchConfig::default();
        config.batch.max_concurrency = 0;
        assert!(matches!(
            DispatcherBuilder::new(config).build(),
            Err(Error::ConfigValidation(_))
        ));

        let mut config = DispatchConfig::default();
        config.routing.tables_path = Some(PathBuf::from("/nonexistent/tables.yaml"));
        assert!(DispatcherBuilder::new(config).build().is_err());
    }

    #[test]
    fn test_adapters_registered() {
        struct Noop;

        #[async_trait::async_trait]
        impl ProviderAdapter for Noop {
            fn provider(&self) -> Provider {
                Provider::Bis
            }

            async fn fetch(
                &self,
                _query: &DataQuery,
            ) -> std::result::Result<serde_json::Value, statroute_core::AdapterError> {
                Ok(serde_json::Value::Null)
            }
        }

        let dispatcher = DispatcherBuilder::new(DispatchConfig::default())
            .with_adapter(Arc::new(Noop))
            .with_metrics(Metrics::new().unwrap())
            .build()
            .unwrap();
        assert!(dispatcher.has_adapter(Provider::Bis));
        assert!(!dispatcher.has_adapter(Provider::Fred));
        assert!(dispatcher.metrics().is_some());
    }
}
