//! Market sentiment from where a price sits in its 52 week range

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Analyzer, strength_from_score};
use crate::api::MarketDataProvider;
use crate::error::AnalyzerError;
use crate::model::{AnalysisSignal, AnalyzerKind, CandidateAsset, metrics};

/// Reads sentiment off the 52 week range position
pub struct SentimentAnalyzer {
    provider: Arc<dyn MarketDataProvider>,
}

impl SentimentAnalyzer {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Analyzer for SentimentAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Sentiment
    }

    async fn analyze(&self, candidate: &CandidateAsset) -> Result<AnalysisSignal, AnalyzerError> {
        let quote = self.provider.quote(&candidate.ticker).await?;
        let position = quote
            .range_position()
            .ok_or_else(|| AnalyzerError::InsufficientData {
                ticker: candidate.ticker.clone(),
                reason: "52 week range unavailable".to_string(),
            })?;

        let (score, reasons) = score(position);
        debug!(ticker = %candidate.ticker, position, score, "Sentiment score");

        let confidence = ((score - 50.0).abs() / 50.0 + 0.2).min(1.0);
        Ok(AnalysisSignal::new(
            AnalyzerKind::Sentiment,
            strength_from_score(score),
            confidence,
            reasons.join(" | "),
        )
        .with_metric(metrics::CURRENT_PRICE, quote.price)
        .with_metric(metrics::RANGE_POSITION_52W, position))
    }
}

fn score(position: f64) -> (f64, Vec<&'static str>) {
    let mut reasons = Vec::new();

    let mut score = if position > 0.8 {
        reasons.push("Bullish market sentiment");
        70.0
    } else if position < 0.2 {
        reasons.push("Bearish market sentiment");
        30.0
    } else {
        reasons.push("Neutral market sentiment");
        50.0
    };

    if position > 0.9 {
        score += 5.0;
        reasons.push("Trading at 52-week highs (momentum)");
    } else if position > 0.7 {
        score += 10.0;
        reasons.push("Strong position in 52-week range");
    } else if position < 0.1 {
        score -= 5.0;
        reasons.push("Trading at 52-week lows (potential value or distress)");
    } else if position < 0.3 {
        score += 5.0;
        reasons.push("Potential value opportunity near 52-week lows");
    }

    (score, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockMarketDataProvider, Quote};
    use crate::model::AssetClass;

    fn quote(price: f64, low: f64, high: f64) -> Quote {
        let mut quote = Quote::new("SPY", price);
        quote.fifty_two_week_low = Some(low);
        quote.fifty_two_week_high = Some(high);
        quote
    }

    async fn analyze(quote: Quote) -> Result<AnalysisSignal, AnalyzerError> {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_quote()
            .returning(move |_| Ok(quote.clone()));
        SentimentAnalyzer::new(Arc::new(provider))
            .analyze(&CandidateAsset::new("SPY", AssetClass::Etfs))
            .await
    }

    #[test]
    fn test_score_bands() {
        assert_eq!(score(0.95).0, 75.0);
        assert_eq!(score(0.85).0, 80.0);
        assert_eq!(score(0.75).0, 60.0);
        assert_eq!(score(0.5).0, 50.0);
        assert_eq!(score(0.25).0, 55.0);
        assert_eq!(score(0.15).0, 35.0);
        assert_eq!(score(0.05).0, 25.0);
    }

    #[tokio::test]
    async fn test_near_highs_is_bullish() {
        let signal = analyze(quote(190.0, 100.0, 200.0)).await.unwrap();
        assert!((signal.strength - 0.6).abs() < 1e-12);
        assert!((signal.confidence - 0.8).abs() < 1e-12);
        assert!((signal.metric(metrics::RANGE_POSITION_52W).unwrap() - 0.9).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_missing_range_fails() {
        let err = analyze(Quote::new("SPY", 400.0)).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::InsufficientData { .. }));
    }
}
