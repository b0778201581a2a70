//! Market data provider interface

pub mod alpha_vantage;
pub mod yahoo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub use alpha_vantage::AlphaVantageFundamentals;
pub use yahoo::YahooMarketData;

/// Latest price and 52 week range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
}

impl Quote {
    /// Quote with only a price
    pub fn new(ticker: impl Into<String>, price: f64) -> Self {
        Self {
            ticker: ticker.into(),
            timestamp: Utc::now(),
            price,
            fifty_two_week_high: None,
            fifty_two_week_low: None,
        }
    }

    /// Position of the price within its 52 week range, in [0, 1]
    pub fn range_position(&self) -> Option<f64> {
        let high = self.fifty_two_week_high?;
        let low = self.fifty_two_week_low?;
        let span = high - low;
        if span <= 0.0 || !span.is_finite() {
            return None;
        }
        Some(((self.price - low) / span).clamp(0.0, 1.0))
    }
}

/// Valuation figures for a company
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub pe_ratio: Option<f64>,
    pub market_cap: Option<f64>,
    /// Fraction, 0.02 for 2%
    pub dividend_yield: Option<f64>,
}

impl Fundamentals {
    /// Nothing reported
    pub fn is_empty(&self) -> bool {
        self.pe_ratio.is_none() && self.market_cap.is_none() && self.dividend_yield.is_none()
    }
}

/// Source of company fundamentals
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    async fn fundamentals(&self, ticker: &str) -> Result<Fundamentals, ProviderError>;
}

/// One bar of price history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Length of a price history request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryPeriod {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl HistoryPeriod {
    pub const fn days(self) -> i64 {
        match self {
            Self::OneMonth => 30,
            Self::ThreeMonths => 90,
            Self::SixMonths => 180,
            Self::OneYear => 365,
            Self::TwoYears => 730,
            Self::FiveYears => 1825,
        }
    }
}

/// Source of quotes and price history.
///
/// Implementations must be safe to call from many analyzer tasks at once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Latest quote for a ticker
    async fn quote(&self, ticker: &str) -> Result<Quote, ProviderError>;

    /// Company fundamentals for a ticker
    async fn fundamentals(&self, ticker: &str) -> Result<Fundamentals, ProviderError>;

    /// Whether `fundamentals` can succeed at all
    fn provides_fundamentals(&self) -> bool {
        true
    }

    /// Latest price for a ticker
    async fn current_price(&self, ticker: &str) -> Result<f64, ProviderError> {
        Ok(self.quote(ticker).await?.price)
    }

    /// Daily bars, oldest first
    async fn historical_series(
        &self,
        ticker: &str,
        period: HistoryPeriod,
    ) -> Result<Vec<PricePoint>, ProviderError>;
}
