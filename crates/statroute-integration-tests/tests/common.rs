//! Common test doubles for integration tests

use statroute_core::{
    AdapterError, DataQuery, OracleError, Provider, ProviderAdapter, RankRequest, RankResult,
    RankingOracle,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

// Adapter with controllable behavior
#[derive(Clone)]
#[allow(dead_code)]
pub struct TestAdapter {
    provider: Provider,
    should_fail: Arc<AtomicBool>,
    rate_limited: Arc<AtomicBool>,
    call_count: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl TestAdapter {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            should_fail: Arc::new(AtomicBool::new(false)),
            rate_limited: Arc::new(AtomicBool::new(false)),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_rate_limited(&self, limited: bool) {
        self.rate_limited.store(limited, Ordering::SeqCst);
    }

    pub fn get_call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn shared(&self) -> Arc<dyn ProviderAdapter> {
        Arc::new(self.clone())
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for TestAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch(&self, query: &DataQuery) -> Result<serde_json::Value, AdapterError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if self.rate_limited.load(Ordering::SeqCst) {
            return Err(AdapterError::RateLimited {
                retry_after_secs: None,
            });
        }
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(AdapterError::Upstream {
                status: Some(503),
                message: format!("{} unavailable", self.provider),
            });
        }

        Ok(serde_json::json!({
            "provider": self.provider.as_str(),
            "query": query.query,
            "country": query.country,
        }))
    }
}

// Oracle that always gives the same answer
#[allow(dead_code)]
pub struct FixedOracle {
    answer: RankResult,
    call_count: AtomicUsize,
}

#[allow(dead_code)]
impl FixedOracle {
    pub fn choosing(provider: &str) -> Self {
        Self {
            answer: RankResult {
                provider: provider.to_string(),
                confidence: 0.9,
                reasoning: format!("{} covers this series", provider),
                fallbacks: vec![],
            },
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn get_call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RankingOracle for FixedOracle {
    async fn rank(&self, _request: &RankRequest) -> Result<RankResult, OracleError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}
