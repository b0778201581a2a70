//! Yahoo Finance market data

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cached::{Cached, TimedCache};
use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;
use yahoo_finance_api as yahoo;

use super::{
    Fundamentals, FundamentalsSource, HistoryPeriod, MarketDataProvider, PricePoint, Quote,
};
use crate::error::ProviderError;

const PROVIDER: &str = "yahoo";
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 120;
const HISTORY_TTL: Duration = Duration::from_secs(300);

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;
type HistoryCache = Arc<RwLock<TimedCache<(String, HistoryPeriod), Vec<PricePoint>>>>;

/// Yahoo Finance adapter.
///
/// Quotes are derived from the one year daily history, which is cached for a
/// few minutes so the sentiment and technical analyzers share one download
/// per ticker. The chart endpoint carries no fundamentals; those come from
/// an optional [`FundamentalsSource`].
#[derive(Clone)]
pub struct YahooMarketData {
    rate_limiter: SharedRateLimiter,
    history: HistoryCache,
    fundamentals: Option<Arc<dyn FundamentalsSource>>,
}

impl YahooMarketData {
    pub fn new() -> Self {
        Self::with_rate_limit(DEFAULT_REQUESTS_PER_MINUTE)
    }

    /// Adapter limited to `per_minute` upstream calls
    pub fn with_rate_limit(per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
            history: Arc::new(RwLock::new(TimedCache::with_lifespan(HISTORY_TTL))),
            fundamentals: None,
        }
    }

    /// Answer `fundamentals` from `source`
    pub fn with_fundamentals(mut self, source: Arc<dyn FundamentalsSource>) -> Self {
        self.fundamentals = Some(source);
        self
    }

    /// Cached daily bars
    async fn history(
        &self,
        ticker: &str,
        period: HistoryPeriod,
    ) -> Result<Vec<PricePoint>, ProviderError> {
        let key = (ticker.to_string(), period);
        if let Some(hit) = self.history.write().await.cache_get(&key).cloned() {
            debug!(ticker, "History cache hit");
            return Ok(hit);
        }

        let points = self.fetch_history(ticker, period).await?;
        let _ = self.history.write().await.cache_set(key, points.clone());
        Ok(points)
    }

    fn connector() -> Result<yahoo::YahooConnector, ProviderError> {
        yahoo::YahooConnector::new().map_err(upstream)
    }

    async fn fetch_history(
        &self,
        ticker: &str,
        period: HistoryPeriod,
    ) -> Result<Vec<PricePoint>, ProviderError> {
        self.rate_limiter.until_ready().await;

        let end = OffsetDateTime::now_utc();
        let start = end - time::Duration::days(period.days());

        debug!(ticker, days = period.days(), "Fetching price history");
        let response = Self::connector()?
            .get_quote_history(ticker, start, end)
            .await
            .map_err(|e| unavailable(ticker, e))?;

        let bars = response.quotes().map_err(|e| unavailable(ticker, e))?;

        let mut points: Vec<PricePoint> = bars
            .iter()
            .filter(|q| q.close.is_finite() && q.close > 0.0)
            .map(|q| PricePoint {
                timestamp: DateTime::from_timestamp(q.timestamp as i64, 0)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
                open: q.open,
                high: q.high,
                low: q.low,
                close: q.close,
                volume: q.volume,
            })
            .collect();
        points.sort_by_key(|p| p.timestamp);

        if points.is_empty() {
            return Err(ProviderError::DataUnavailable {
                ticker: ticker.to_string(),
                reason: "empty price history".to_string(),
            });
        }
        Ok(points)
    }
}

impl Default for YahooMarketData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for YahooMarketData {
    async fn quote(&self, ticker: &str) -> Result<Quote, ProviderError> {
        let year = self.history(ticker, HistoryPeriod::OneYear).await?;
        quote_from_history(ticker, &year)
    }

    async fn fundamentals(&self, ticker: &str) -> Result<Fundamentals, ProviderError> {
        match &self.fundamentals {
            Some(source) => source.fundamentals(ticker).await,
            None => Err(ProviderError::DataUnavailable {
                ticker: ticker.to_string(),
                reason: "no fundamentals source configured".to_string(),
            }),
        }
    }

    fn provides_fundamentals(&self) -> bool {
        self.fundamentals.is_some()
    }

    async fn current_price(&self, ticker: &str) -> Result<f64, ProviderError> {
        self.rate_limiter.until_ready().await;

        let response = Self::connector()?
            .get_latest_quotes(ticker, "1d")
            .await
            .map_err(|e| unavailable(ticker, e))?;

        let latest = response.last_quote().map_err(|e| unavailable(ticker, e))?;
        if !latest.close.is_finite() || latest.close <= 0.0 {
            return Err(ProviderError::InvalidTicker(ticker.to_string()));
        }
        Ok(latest.close)
    }

    async fn historical_series(
        &self,
        ticker: &str,
        period: HistoryPeriod,
    ) -> Result<Vec<PricePoint>, ProviderError> {
        self.history(ticker, period).await
    }
}

/// Latest close as the price, range from the bars' highs and lows
fn quote_from_history(ticker: &str, bars: &[PricePoint]) -> Result<Quote, ProviderError> {
    let last = bars.last().ok_or_else(|| ProviderError::DataUnavailable {
        ticker: ticker.to_string(),
        reason: "empty price history".to_string(),
    })?;
    let high = bars.iter().map(|p| p.high).fold(f64::NEG_INFINITY, f64::max);
    let low = bars.iter().map(|p| p.low).fold(f64::INFINITY, f64::min);

    let mut quote = Quote::new(ticker, last.close);
    quote.timestamp = last.timestamp;
    quote.fifty_two_week_high = high.is_finite().then_some(high);
    quote.fifty_two_week_low = low.is_finite().then_some(low);
    Ok(quote)
}

fn upstream(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::Upstream {
        provider: PROVIDER.to_string(),
        message: e.to_string(),
    }
}

fn unavailable(ticker: &str, e: impl std::fmt::Display) -> ProviderError {
    ProviderError::DataUnavailable {
        ticker: ticker.to_string(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockFundamentalsSource;
    use chrono::TimeZone;

    fn bar(day: u32, low: f64, high: f64, close: f64) -> PricePoint {
        PricePoint {
            timestamp: Utc.with_ymd_and_hms(2025, 3, day, 21, 0, 0).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn test_quote_from_history() {
        let bars = [bar(3, 90.0, 120.0, 110.0), bar(4, 80.0, 115.0, 100.0)];
        let quote = quote_from_history("AAPL", &bars).unwrap();
        assert_eq!(quote.price, 100.0);
        assert_eq!(quote.timestamp, bars[1].timestamp);
        assert_eq!(quote.fifty_two_week_high, Some(120.0));
        assert_eq!(quote.fifty_two_week_low, Some(80.0));
        assert!(quote_from_history("AAPL", &[]).is_err());
    }

    #[tokio::test]
    async fn test_cached_history_serves_quote_and_series() {
        let provider = YahooMarketData::with_rate_limit(1);
        let bars = vec![bar(3, 90.0, 120.0, 110.0), bar(4, 80.0, 115.0, 100.0)];
        let _ = provider
            .history
            .write()
            .await
            .cache_set(("MSFT".to_string(), HistoryPeriod::OneYear), bars.clone());

        let quote = provider.quote("MSFT").await.unwrap();
        let series = provider
            .historical_series("MSFT", HistoryPeriod::OneYear)
            .await
            .unwrap();
        assert_eq!(quote.price, 100.0);
        assert_eq!(series, bars);
        // a single-call quota still has its call, so nothing went upstream
        assert!(provider.rate_limiter.check().is_ok());
    }

    #[tokio::test]
    async fn test_fundamentals_need_a_source() {
        let provider = YahooMarketData::new();
        assert!(!provider.provides_fundamentals());
        assert!(matches!(
            provider.fundamentals("KO").await,
            Err(ProviderError::DataUnavailable { .. })
        ));

        let mut source = MockFundamentalsSource::new();
        source.expect_fundamentals().returning(|_| {
            Ok(Fundamentals {
                pe_ratio: Some(24.8),
                ..Fundamentals::default()
            })
        });
        let provider = provider.with_fundamentals(Arc::new(source));
        assert!(provider.provides_fundamentals());
        assert_eq!(provider.fundamentals("KO").await.unwrap().pe_ratio, Some(24.8));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_quote() {
        let provider = YahooMarketData::new();
        let quote = provider.quote("AAPL").await.unwrap();
        assert_eq!(quote.ticker, "AAPL");
        assert!(quote.price > 0.0);
        assert!(quote.range_position().is_some());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_historical_series() {
        let provider = YahooMarketData::new();
        let series = provider
            .historical_series("MSFT", HistoryPeriod::ThreeMonths)
            .await
            .unwrap();
        assert!(!series.is_empty());
        assert!(series.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_unknown_ticker() {
        let provider = YahooMarketData::new();
        assert!(provider.current_price("INVALID_SYMBOL_12345").await.is_err());
    }
}
