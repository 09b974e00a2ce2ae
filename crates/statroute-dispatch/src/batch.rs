//! Multi-country fan-out

use futures::future::join_all;
use statroute_core::{DataQuery, Error, Result};
use tokio::sync::Semaphore;

use crate::dispatcher::{DispatchOutcome, Dispatcher};

/// Per-country results of a batch fetch
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Successful branches, in request order
    pub successes: Vec<(String, DispatchOutcome)>,
    /// Failed branches as (country, error message), in request order
    pub failures: Vec<(String, String)>,
}

impl BatchOutcome {
    pub fn is_partial(&self) -> bool {
        !self.successes.is_empty() && !self.failures.is_empty()
    }
}

impl Dispatcher {
    /// Fetch `query` once per country, at most `batch.max_concurrency` at a time
    ///
    /// Each branch routes on its own, so different countries may land on
    /// different providers.
    ///
    /// # Errors
    /// - `Error::InvalidRequest` if `countries` is empty
    /// - `Error::BatchFailed` if every branch fails
    pub async fn fetch_batch(&self, query: &DataQuery, countries: &[String]) -> Result<BatchOutcome> {
        if countries.is_empty() {
            return Err(Error::InvalidRequest(
                "batch fetch needs at least one country".to_string(),
            ));
        }

        let semaphore = Semaphore::new(self.batch.max_concurrency.max(1));
        let branches = countries.iter().map(|country| {
            let semaphore = &semaphore;
            let branch = DataQuery {
                country: Some(country.clone()),
                countries: Vec::new(),
                ..query.clone()
            };
            async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => self.fetch(&branch).await,
                    Err(_) => Err(Error::Internal(
                        "Failed to acquire batch permit".to_string(),
                    )),
                };
                (country.clone(), result)
            }
        });

        let mut outcome = BatchOutcome::default();
        for (country, result) in join_all(branches).await {
            match result {
                Ok(fetched) => outcome.successes.push((country, fetched)),
                Err(e) => {
                    tracing::warn!(country = %country, error = %e, "Batch branch failed");
                    outcome.failures.push((country, e.to_string()));
                }
            }
        }

        if outcome.successes.is_empty() {
            return Err(Error::BatchFailed {
                failures: outcome.failures,
            });
        }

        tracing::info!(
            successes = outcome.successes.len(),
            failures = outcome.failures.len(),
            "Batch fetch completed"
        );
        Ok(outcome)
    }
}
