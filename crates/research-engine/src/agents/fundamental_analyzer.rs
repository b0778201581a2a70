//! Valuation analysis from company fundamentals

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Analyzer, strength_from_score};
use crate::api::{Fundamentals, MarketDataProvider};
use crate::error::AnalyzerError;
use crate::model::{AnalysisSignal, AnalyzerKind, AssetClass, CandidateAsset, metrics};

const BILLION: f64 = 1_000_000_000.0;

/// Scores P/E, market capitalization and dividend yield
pub struct FundamentalAnalyzer {
    provider: Arc<dyn MarketDataProvider>,
}

impl FundamentalAnalyzer {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Analyzer for FundamentalAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Fundamental
    }

    async fn analyze(&self, candidate: &CandidateAsset) -> Result<AnalysisSignal, AnalyzerError> {
        if candidate.asset_class == AssetClass::Crypto {
            return Err(AnalyzerError::InsufficientData {
                ticker: candidate.ticker.clone(),
                reason: "crypto assets report no fundamentals".to_string(),
            });
        }

        let fundamentals = self.provider.fundamentals(&candidate.ticker).await?;
        if fundamentals.is_empty() {
            return Err(AnalyzerError::InsufficientData {
                ticker: candidate.ticker.clone(),
                reason: "no fundamentals reported".to_string(),
            });
        }

        let (score, reasons) = score(&fundamentals);
        debug!(ticker = %candidate.ticker, score, "Fundamental score");

        let confidence = if score >= 70.0 {
            (score - 50.0) / 50.0
        } else if score <= 30.0 {
            (50.0 - score) / 50.0
        } else {
            0.5
        };

        let mut signal = AnalysisSignal::new(
            AnalyzerKind::Fundamental,
            strength_from_score(score),
            confidence.min(1.0),
            reasons.join(" | "),
        );

        for (key, value) in [
            (metrics::PE_RATIO, fundamentals.pe_ratio),
            (metrics::MARKET_CAP, fundamentals.market_cap),
            (metrics::DIVIDEND_YIELD, fundamentals.dividend_yield),
        ] {
            if let Some(value) = value {
                signal = signal.with_metric(key, value);
            }
        }
        Ok(signal)
    }
}

fn score(fundamentals: &Fundamentals) -> (f64, Vec<String>) {
    let mut score = 50.0;
    let mut reasons = Vec::new();

    match fundamentals.pe_ratio {
        Some(pe) if pe < 0.0 => {
            score -= 10.0;
            reasons.push("Negative earnings".to_string());
        }
        Some(pe) if pe < 15.0 => {
            score += 20.0;
            reasons.push(format!("Low P/E ({pe:.1}) suggests undervaluation"));
        }
        Some(pe) if pe < 25.0 => {
            score += 10.0;
            reasons.push(format!("Reasonable P/E ({pe:.1})"));
        }
        Some(pe) if pe < 40.0 => {
            reasons.push(format!("Elevated P/E ({pe:.1}) pricing in growth"));
        }
        Some(pe) => {
            score -= 10.0;
            reasons.push(format!("High P/E ({pe:.1}) may indicate overvaluation"));
        }
        None => reasons.push("P/E ratio unavailable".to_string()),
    }

    if let Some(cap) = fundamentals.market_cap {
        let (delta, label) = if cap > 200.0 * BILLION {
            (10.0, "Mega-cap with stability")
        } else if cap > 50.0 * BILLION {
            (8.0, "Large-cap company")
        } else if cap > 10.0 * BILLION {
            (5.0, "Mid-cap with growth potential")
        } else if cap > 2.0 * BILLION {
            (2.0, "Small-cap with higher risk/reward")
        } else {
            (-5.0, "Micro-cap with elevated risk")
        };
        score += delta;
        reasons.push(label.to_string());
    }

    if let Some(dividend) = fundamentals.dividend_yield.filter(|d| *d > 0.0) {
        let pct = dividend * 100.0;
        if dividend > 0.05 {
            score += 10.0;
            reasons.push(format!("Strong dividend yield ({pct:.1}%)"));
        } else if dividend > 0.02 {
            score += 5.0;
            reasons.push(format!("Moderate dividend ({pct:.1}%)"));
        } else {
            score += 2.0;
            reasons.push(format!("Small dividend ({pct:.2}%)"));
        }
    }

    (score, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockMarketDataProvider;
    use crate::error::ProviderError;

    fn provider_with(fundamentals: Fundamentals) -> Arc<dyn MarketDataProvider> {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_fundamentals()
            .returning(move |_| Ok(fundamentals.clone()));
        provider.expect_quote().never();
        Arc::new(provider)
    }

    #[tokio::test]
    async fn test_undervalued_mega_cap_is_bullish() {
        let fundamentals = Fundamentals {
            pe_ratio: Some(12.0),
            market_cap: Some(2_500.0 * BILLION),
            dividend_yield: Some(0.03),
        };

        let analyzer = FundamentalAnalyzer::new(provider_with(fundamentals));
        let signal = analyzer
            .analyze(&CandidateAsset::new("AAPL", AssetClass::Stocks))
            .await
            .unwrap();

        // 50 + 20 + 10 + 5
        assert!((signal.strength - 0.7).abs() < 1e-12);
        assert!((signal.confidence - 0.7).abs() < 1e-12);
        assert_eq!(signal.metric(metrics::PE_RATIO), Some(12.0));
        assert_eq!(signal.metric(metrics::DIVIDEND_YIELD), Some(0.03));
        assert!(signal.rationale.contains("Low P/E (12.0)"));
    }

    #[tokio::test]
    async fn test_neutral_score_has_half_confidence() {
        let fundamentals = Fundamentals {
            pe_ratio: Some(45.0),
            market_cap: Some(60.0 * BILLION),
            dividend_yield: None,
        };

        let analyzer = FundamentalAnalyzer::new(provider_with(fundamentals));
        let signal = analyzer
            .analyze(&CandidateAsset::new("XYZ", AssetClass::Stocks))
            .await
            .unwrap();

        assert!((signal.strength + 0.04).abs() < 1e-12);
        assert_eq!(signal.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_missing_fundamentals_fail() {
        let analyzer = FundamentalAnalyzer::new(provider_with(Fundamentals::default()));
        let err = analyzer
            .analyze(&CandidateAsset::new("SPY", AssetClass::Etfs))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::InsufficientData { .. }));
    }

    #[tokio::test]
    async fn test_crypto_skips_the_provider() {
        let mut provider = MockMarketDataProvider::new();
        provider.expect_fundamentals().never();

        let analyzer = FundamentalAnalyzer::new(Arc::new(provider));
        let err = analyzer
            .analyze(&CandidateAsset::new("BTC-USD", AssetClass::Crypto))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::InsufficientData { .. }));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_fundamentals()
            .returning(|_| Err(ProviderError::RateLimitExceeded {
                provider: "alpha_vantage".to_string(),
            }));

        let analyzer = FundamentalAnalyzer::new(Arc::new(provider));
        let err = analyzer
            .analyze(&CandidateAsset::new("NOPE", AssetClass::Stocks))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::Provider(ProviderError::RateLimitExceeded { .. })
        ));
    }
}
