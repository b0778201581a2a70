//! Alpha Vantage company fundamentals

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cached::{Cached, TimedCache};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Fundamentals, FundamentalsSource};
use crate::error::ProviderError;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "alpha_vantage";
const FREE_TIER_PER_MINUTE: u32 = 5;
const OVERVIEW_TTL: Duration = Duration::from_secs(3600);

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// OVERVIEW payload; Alpha Vantage reports every number as a string
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CompanyOverview {
    symbol: Option<String>,
    #[serde(rename = "MarketCapitalization")]
    market_cap: Option<String>,
    #[serde(rename = "PERatio")]
    pe_ratio: Option<String>,
    #[serde(rename = "DividendYield")]
    dividend_yield: Option<String>,
}

impl From<CompanyOverview> for Fundamentals {
    fn from(overview: CompanyOverview) -> Self {
        Self {
            pe_ratio: number(overview.pe_ratio.as_deref()),
            market_cap: number(overview.market_cap.as_deref()),
            dividend_yield: number(overview.dividend_yield.as_deref()),
        }
    }
}

/// "None", "-" and blanks mean not reported
fn number(raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim();
    if raw.is_empty() || raw == "None" || raw == "-" {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Company overview client.
///
/// Overviews change slowly, so each ticker is fetched at most once an hour.
/// When the per-minute quota is spent the call fails at once instead of
/// holding an analyzer slot.
#[derive(Clone)]
pub struct AlphaVantageFundamentals {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
    cache: Arc<RwLock<TimedCache<String, Fundamentals>>>,
}

impl AlphaVantageFundamentals {
    /// Client allowed `per_minute` OVERVIEW calls
    pub fn new(api_key: impl Into<String>, per_minute: u32) -> Self {
        let quota = NonZeroU32::new(per_minute)
            .or(NonZeroU32::new(FREE_TIER_PER_MINUTE))
            .unwrap_or(NonZeroU32::MIN);
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(quota))),
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(OVERVIEW_TTL))),
        }
    }

    /// Read `ALPHA_VANTAGE_API_KEY`, and `ALPHA_VANTAGE_REQUESTS_PER_MINUTE`
    /// when set (free tier otherwise)
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("ALPHA_VANTAGE_API_KEY").map_err(|_| {
            ProviderError::Upstream {
                provider: PROVIDER.to_string(),
                message: "ALPHA_VANTAGE_API_KEY environment variable not set".to_string(),
            }
        })?;
        let per_minute = match std::env::var("ALPHA_VANTAGE_REQUESTS_PER_MINUTE") {
            Ok(raw) => raw.trim().parse().map_err(|e| ProviderError::Upstream {
                provider: PROVIDER.to_string(),
                message: format!("ALPHA_VANTAGE_REQUESTS_PER_MINUTE: {e}"),
            })?,
            Err(_) => FREE_TIER_PER_MINUTE,
        };
        Ok(Self::new(api_key, per_minute))
    }

    async fn fetch_overview(&self, ticker: &str) -> Result<Fundamentals, ProviderError> {
        if self.rate_limiter.check().is_err() {
            return Err(ProviderError::RateLimitExceeded {
                provider: PROVIDER.to_string(),
            });
        }

        let mut params = HashMap::new();
        params.insert("function", "OVERVIEW");
        params.insert("symbol", ticker);
        params.insert("apikey", self.api_key.as_str());

        debug!(ticker, "Fetching company overview");
        let response = self
            .client
            .get(BASE_URL)
            .query(&params)
            .send()
            .await
            .map_err(upstream)?;
        if !response.status().is_success() {
            return Err(upstream(format!("HTTP error: {}", response.status())));
        }

        let data: serde_json::Value = response.json().await.map_err(upstream)?;
        parse_overview(ticker, data)
    }
}

fn parse_overview(ticker: &str, data: serde_json::Value) -> Result<Fundamentals, ProviderError> {
    if let Some(error) = data.get("Error Message") {
        return Err(upstream(error));
    }
    if data.get("Note").is_some() || data.get("Information").is_some() {
        return Err(ProviderError::RateLimitExceeded {
            provider: PROVIDER.to_string(),
        });
    }
    if data.as_object().is_none_or(|o| o.is_empty()) {
        return Err(ProviderError::InvalidTicker(ticker.to_string()));
    }

    let overview: CompanyOverview = serde_json::from_value(data).map_err(upstream)?;
    if overview.symbol.as_deref().is_some_and(|s| !s.eq_ignore_ascii_case(ticker)) {
        return Err(upstream(format!("overview for {ticker} answered for another symbol")));
    }
    Ok(overview.into())
}

#[async_trait]
impl FundamentalsSource for AlphaVantageFundamentals {
    async fn fundamentals(&self, ticker: &str) -> Result<Fundamentals, ProviderError> {
        let key = ticker.to_uppercase();
        if let Some(hit) = self.cache.write().await.cache_get(&key).cloned() {
            debug!(ticker, "Overview cache hit");
            return Ok(hit);
        }

        let fundamentals = self.fetch_overview(ticker).await?;
        let _ = self.cache.write().await.cache_set(key, fundamentals.clone());
        Ok(fundamentals)
    }
}

fn upstream(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::Upstream {
        provider: PROVIDER.to_string(),
        message: e.to_string(),
    }
}
