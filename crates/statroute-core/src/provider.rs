//! Provider set and adapter trait definitions
//!
//! The provider set is fixed at compile time. Adapters that actually talk to
//! the upstream services live outside this workspace and implement
//! [`ProviderAdapter`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upstream data source that can serve a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Provider {
    /// US Federal Reserve economic data
    Fred,
    /// World Bank development indicators (global, generic)
    WorldBank,
    /// International Monetary Fund (fiscal, forecasts)
    Imf,
    /// EU statistical office
    Eurostat,
    /// OECD statistics
    Oecd,
    /// Bank for International Settlements
    Bis,
    /// UN Comtrade merchandise trade flows
    Comtrade,
    /// Statistics Canada
    StatsCan,
    /// Currency exchange rates
    ExchangeRate,
    /// Crypto asset prices
    CoinGecko,
}

impl Provider {
    /// Every provider, in declaration order
    pub const ALL: [Provider; 10] = [
        Provider::Fred,
        Provider::WorldBank,
        Provider::Imf,
        Provider::Eurostat,
        Provider::Oecd,
        Provider::Bis,
        Provider::Comtrade,
        Provider::StatsCan,
        Provider::ExchangeRate,
        Provider::CoinGecko,
    ];

    /// Canonical identifier used in config files, cache keys and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Fred => "FRED",
            Provider::WorldBank => "WORLDBANK",
            Provider::Imf => "IMF",
            Provider::Eurostat => "EUROSTAT",
            Provider::Oecd => "OECD",
            Provider::Bis => "BIS",
            Provider::Comtrade => "COMTRADE",
            Provider::StatsCan => "STATSCAN",
            Provider::ExchangeRate => "EXCHANGERATE",
            Provider::CoinGecko => "COINGECKO",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    /// Case-insensitive; ignores spaces, dashes, underscores and dots so that
    /// "World Bank", "world_bank" and "WORLDBANK" all resolve.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let provider = match key.as_str() {
            "fred" | "federalreserve" | "stlouisfed" => Provider::Fred,
            "worldbank" | "wb" => Provider::WorldBank,
            "imf" | "internationalmonetaryfund" => Provider::Imf,
            "eurostat" => Provider::Eurostat,
            "oecd" => Provider::Oecd,
            "bis" | "bankforinternationalsettlements" => Provider::Bis,
            "comtrade" | "uncomtrade" => Provider::Comtrade,
            "statscan" | "statcan" | "statisticscanada" => Provider::StatsCan,
            "exchangerate" | "exchangerateapi" | "fx" => Provider::ExchangeRate,
            "coingecko" => Provider::CoinGecko,
            _ => return Err(UnknownProvider(s.to_string())),
        };
        Ok(provider)
    }
}

impl TryFrom<String> for Provider {
    type Error = UnknownProvider;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Provider> for String {
    fn from(provider: Provider) -> Self {
        provider.as_str().to_string()
    }
}

/// Reporting frequency of a data series; drives cache TTL selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
}

impl Frequency {
    /// Parse SDMX-style codes ("D", "M", "A") and plain words ("monthly", "yearly").
    /// Returns `None` for anything unrecognized.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "d" | "daily" | "day" => Some(Frequency::Daily),
            "w" | "weekly" | "week" => Some(Frequency::Weekly),
            "m" | "monthly" | "month" => Some(Frequency::Monthly),
            "q" | "quarterly" | "quarter" => Some(Frequency::Quarterly),
            "a" | "y" | "annual" | "annually" | "yearly" | "year" => Some(Frequency::Annual),
            _ => None,
        }
    }
}

/// A data request as seen by the dispatcher and the provider adapters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQuery {
    /// Original natural-language request
    pub query: String,
    /// Indicator names extracted upstream (may be empty)
    #[serde(default)]
    pub indicators: Vec<String>,
    /// Single target country, if any
    #[serde(default)]
    pub country: Option<String>,
    /// Multiple target countries, if any
    #[serde(default)]
    pub countries: Vec<String>,
    /// Provider suggested by the caller (e.g. an upstream classifier)
    #[serde(default)]
    pub external_hint: Option<String>,
    /// Reporting frequency, when known
    #[serde(default)]
    pub frequency: Option<Frequency>,
    /// Provider-agnostic parameters forwarded to adapters; also the cache key input
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl DataQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_indicator(mut self, indicator: impl Into<String>) -> Self {
        self.indicators.push(indicator.into());
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

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Parameters that identify this request for caching. Covers every field
    /// an adapter can read: the query text, the indicator list, the
    /// countries, the hint and the frequency alongside `params`.
    pub fn cache_params(&self) -> serde_json::Value {
        let mut params = self.params.clone();
        params.insert("query".to_string(), serde_json::json!(self.query));
        params.insert("indicators".to_string(), serde_json::json!(self.indicators));
        if let Some(hint) = &self.external_hint {
            params.insert("external_hint".to_string(), serde_json::json!(hint));
        }
        if let Some(country) = &self.country {
            params.insert("country".to_string(), serde_json::json!(country));
        }
        if !self.countries.is_empty() {
            params.insert("countries".to_string(), serde_json::json!(self.countries));
        }
        if let Some(frequency) = self.frequency {
            params.insert("frequency".to_string(), serde_json::json!(frequency));
        }
        serde_json::Value::Object(params)
    }
}

/// Failure reported by a provider adapter
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// Upstream answered 429; the only outcome that opens the circuit breaker
    #[error("Upstream rate limit (429){}", retry_after_secs.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Upstream timeout: {0}")]
    Timeout(String),

    #[error("Upstream error{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Upstream { status: Option<u16>, message: String },

    #[error("No data: {0}")]
    NoData(String),
}

impl AdapterError {
    /// Classify an HTTP status returned by an upstream service
    pub fn from_status(status: u16, message: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        match status {
            429 => AdapterError::RateLimited { retry_after_secs },
            404 => AdapterError::NoData(message.into()),
            408 | 504 => AdapterError::Timeout(message.into()),
            _ => AdapterError::Upstream {
                status: Some(status),
                message: message.into(),
            },
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AdapterError::RateLimited { .. })
    }
}

/// Adapter that performs the upstream fetch for one provider
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider this adapter serves
    fn provider(&self) -> Provider;

    /// Fetch data for the query
    async fn fetch(&self, query: &DataQuery) -> Result<serde_json::Value, AdapterError>;
}
