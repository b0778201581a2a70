//! Technical analysis over daily price history

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Analyzer, strength_from_score};
use crate::api::{HistoryPeriod, MarketDataProvider};
use crate::error::AnalyzerError;
use crate::model::{AnalysisSignal, AnalyzerKind, CandidateAsset, metrics};
use crate::quant::signals::{self, Action, MIN_CLOSES, QuantSignal};
use crate::quant::ReturnStats;

/// Combines indicator consensus with return statistics
pub struct TechnicalAnalyzer {
    provider: Arc<dyn MarketDataProvider>,
    period: HistoryPeriod,
    min_points: usize,
}

impl TechnicalAnalyzer {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        period: HistoryPeriod,
        min_points: usize,
    ) -> Self {
        Self {
            provider,
            period,
            min_points: min_points.max(MIN_CLOSES),
        }
    }
}

#[async_trait]
impl Analyzer for TechnicalAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Technical
    }

    async fn analyze(&self, candidate: &CandidateAsset) -> Result<AnalysisSignal, AnalyzerError> {
        let history = self
            .provider
            .historical_series(&candidate.ticker, self.period)
            .await?;
        let closes: Vec<f64> = history.iter().map(|p| p.close).collect();

        if closes.len() < self.min_points {
            return Err(AnalyzerError::InsufficientData {
                ticker: candidate.ticker.clone(),
                reason: format!(
                    "{} closes, at least {} required",
                    closes.len(),
                    self.min_points
                ),
            });
        }

        let stats = ReturnStats::from_closes(&closes).ok_or_else(|| {
            AnalyzerError::InsufficientData {
                ticker: candidate.ticker.clone(),
                reason: "price series contains non-positive closes".to_string(),
            }
        })?;
        let consensus = signals::aggregate(&signals::evaluate(&closes)?);

        let (score, reasons) = score(&consensus, &stats);
        debug!(
            ticker = %candidate.ticker,
            action = %consensus.action,
            score,
            "Technical score"
        );

        let confidence = ((score - 50.0).abs() / 50.0 + 0.3).min(1.0);
        let price = closes[closes.len() - 1];

        Ok(AnalysisSignal::new(
            AnalyzerKind::Technical,
            strength_from_score(score),
            confidence,
            reasons.join(" | "),
        )
        .with_metric(metrics::CURRENT_PRICE, price)
        .with_metric(metrics::HISTORICAL_RETURN, stats.total_return)
        .with_metric(metrics::VOLATILITY, stats.volatility)
        .with_metric(metrics::SHARPE_RATIO, stats.sharpe_ratio)
        .with_metric(metrics::MAX_DRAWDOWN, stats.max_drawdown)
        .with_metric(metrics::CONSENSUS_DIRECTION, consensus.action.direction())
        .with_metric(metrics::CONSENSUS_STRENGTH, consensus.strength))
    }
}

fn score(consensus: &QuantSignal, stats: &ReturnStats) -> (f64, Vec<String>) {
    let strength = consensus.strength;
    let mut reasons = Vec::new();

    let mut score = match consensus.action {
        Action::Buy => {
            reasons.push(format!("Technical buy signal (strength: {:.0}%)", strength * 100.0));
            60.0 + strength * 30.0
        }
        Action::Sell => {
            reasons.push(format!("Technical sell signal (strength: {:.0}%)", strength * 100.0));
            40.0 - strength * 30.0
        }
        Action::Hold => {
            reasons.push("Technical indicators neutral".to_string());
            50.0
        }
    };

    let ret = stats.total_return;
    let pct = ret * 100.0;
    if ret > 0.2 {
        score += 10.0;
        reasons.push(format!("Strong 1Y return ({pct:.1}%)"));
    } else if ret > 0.0 {
        score += 5.0;
        reasons.push(format!("Positive 1Y return ({pct:.1}%)"));
    } else if ret < -0.2 {
        score -= 10.0;
        reasons.push(format!("Poor 1Y return ({pct:.1}%)"));
    } else {
        score -= 5.0;
        reasons.push(format!("Negative 1Y return ({pct:.1}%)"));
    }

    let vol = stats.volatility;
    if vol < 0.2 {
        score += 5.0;
        reasons.push(format!("Low volatility ({:.1}%)", vol * 100.0));
    } else if vol > 0.5 {
        score -= 5.0;
        reasons.push(format!("High volatility ({:.1}%)", vol * 100.0));
    }

    let sharpe = stats.sharpe_ratio;
    if sharpe > 1.0 {
        score += 10.0;
        reasons.push(format!("Excellent risk-adjusted returns (Sharpe: {sharpe:.2})"));
    } else if sharpe > 0.5 {
        score += 5.0;
        reasons.push(format!("Good risk-adjusted returns (Sharpe: {sharpe:.2})"));
    } else if sharpe < 0.0 {
        score -= 5.0;
        reasons.push(format!("Negative risk-adjusted returns (Sharpe: {sharpe:.2})"));
    }

    (score.clamp(0.0, 100.0), reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockMarketDataProvider, PricePoint};
    use crate::model::AssetClass;
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64]) -> Vec<PricePoint> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1_000,
            })
            .collect()
    }

    fn analyzer_for(closes: Vec<f64>) -> TechnicalAnalyzer {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_historical_series()
            .returning(move |_, _| Ok(series(&closes)));
        TechnicalAnalyzer::new(Arc::new(provider), HistoryPeriod::OneYear, 60)
    }

    #[tokio::test]
    async fn test_steady_uptrend_is_bullish() {
        let closes: Vec<f64> = (0..200).map(|i| 100.0 * 1.003_f64.powi(i)).collect();
        let signal = analyzer_for(closes)
            .analyze(&CandidateAsset::new("UP", AssetClass::Stocks))
            .await
            .unwrap();

        assert!(signal.strength > 0.0);
        assert!(signal.confidence >= 0.3);
        assert!(signal.metric(metrics::VOLATILITY).is_some());
        assert!(signal.metric(metrics::HISTORICAL_RETURN).unwrap() > 0.2);
        assert!(signal.rationale.contains("Strong 1Y return"));
    }

    #[tokio::test]
    async fn test_steady_decline_is_bearish() {
        let closes: Vec<f64> = (0..200).map(|i| 100.0 * 0.997_f64.powi(i)).collect();
        let signal = analyzer_for(closes)
            .analyze(&CandidateAsset::new("DOWN", AssetClass::Stocks))
            .await
            .unwrap();

        assert!(signal.strength < 0.0);
        assert!(signal.rationale.contains("Poor 1Y return"));
        assert!(signal.metric(metrics::MAX_DRAWDOWN).unwrap() < -0.4);
    }

    #[tokio::test]
    async fn test_short_history_fails() {
        let closes: Vec<f64> = (0..30).map(|i| 10.0 + f64::from(i)).collect();
        let err = analyzer_for(closes)
            .analyze(&CandidateAsset::new("NEW", AssetClass::Stocks))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::InsufficientData { .. }));
    }
}
