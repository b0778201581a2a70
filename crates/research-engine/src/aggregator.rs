//! Risk-weighted combination of analyzer signals

use tracing::{debug, warn};

use crate::config::{ToleranceTable, WeightTable};
use crate::coordinator::CandidateAnalysis;
use crate::model::{
    AnalysisSignal, AnalyzerKind, CandidateAsset, CompositeScore, DropReason, DroppedCandidate,
    RiskPreference, metrics,
};

/// A candidate that cleared the confidence floor
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: CandidateAsset,
    pub score: CompositeScore,
    /// Successful signals only
    pub signals: Vec<AnalysisSignal>,
    /// Present when the technical signal reported volatility or Sharpe
    pub risk: Option<RiskAssessment>,
}

/// A candidate's risk metrics checked against the preference's tolerance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAssessment {
    pub volatility: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub within_tolerance: bool,
}

impl RiskAssessment {
    /// One line for the pick rationale
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(vol) = self.volatility {
            parts.push(format!("vol {:.1}%", vol * 100.0));
        }
        if let Some(sharpe) = self.sharpe_ratio {
            parts.push(format!("Sharpe {sharpe:.2}"));
        }
        let verdict = if self.within_tolerance {
            "within tolerance"
        } else {
            "outside tolerance, score reduced"
        };
        format!("{} ({verdict})", parts.join(", "))
    }
}

/// Output of aggregation
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub scored: Vec<ScoredCandidate>,
    pub dropped: Vec<DroppedCandidate>,
}

/// Weighted average of signals under a risk preference
#[derive(Debug, Clone)]
pub struct SignalAggregator {
    weights: WeightTable,
    tolerance: ToleranceTable,
    confidence_floor: f64,
}

impl SignalAggregator {
    pub fn new(weights: WeightTable, tolerance: ToleranceTable, confidence_floor: f64) -> Self {
        Self {
            weights,
            tolerance,
            confidence_floor,
        }
    }

    /// Composite score over the successful signals.
    ///
    /// Strength is the confidence-weighted mean of strengths. Confidence is
    /// the satisfied share of the intended weight, so a missing analyzer
    /// lowers it.
    pub fn composite(
        &self,
        ticker: &str,
        preference: RiskPreference,
        signals: &[AnalysisSignal],
    ) -> CompositeScore {
        let intended = self.weights.total(preference);
        let mut weighted_confidence = 0.0;
        let mut weighted_strength = 0.0;
        let mut contributors = 0;

        for signal in signals.iter().filter(|s| s.is_success()) {
            let wc = self.weights.weight(preference, signal.kind) * signal.confidence;
            weighted_confidence += wc;
            weighted_strength += wc * signal.strength;
            contributors += 1;
        }

        let strength = if weighted_confidence > 0.0 {
            weighted_strength / weighted_confidence
        } else {
            0.0
        };
        let confidence = if intended > 0.0 {
            weighted_confidence / intended
        } else {
            0.0
        };

        CompositeScore::new(ticker, strength, confidence, contributors)
    }

    /// Check the technical metrics against the preference's tolerance
    pub fn assess(
        &self,
        preference: RiskPreference,
        signals: &[AnalysisSignal],
    ) -> Option<RiskAssessment> {
        let technical = signals
            .iter()
            .find(|s| s.kind == AnalyzerKind::Technical && s.is_success())?;
        let volatility = technical.metric(metrics::VOLATILITY);
        let sharpe_ratio = technical.metric(metrics::SHARPE_RATIO);
        if volatility.is_none() && sharpe_ratio.is_none() {
            return None;
        }

        let within_tolerance = self
            .tolerance
            .get(preference)
            .is_none_or(|t| t.admits(volatility, sharpe_ratio));
        Some(RiskAssessment {
            volatility,
            sharpe_ratio,
            within_tolerance,
        })
    }

    /// Score every analyzed candidate and apply the confidence floor.
    ///
    /// Candidates outside the preference's risk tolerance stay in the pool
    /// with the configured penalty taken off their strength.
    pub fn aggregate(
        &self,
        preference: RiskPreference,
        analyzed: Vec<CandidateAnalysis>,
    ) -> Aggregation {
        let mut aggregation = Aggregation::default();

        for analysis in analyzed {
            let signals: Vec<AnalysisSignal> =
                analysis.signals.into_iter().filter(AnalysisSignal::is_success).collect();
            let mut score = self.composite(&analysis.candidate.ticker, preference, &signals);
            let risk = self.assess(preference, &signals);

            let penalty = match (&risk, self.tolerance.get(preference)) {
                (Some(risk), Some(tolerance)) if !risk.within_tolerance => Some(tolerance.penalty),
                _ => None,
            };
            if let Some(penalty) = penalty {
                debug!(
                    ticker = %score.ticker,
                    volatility = ?risk.and_then(|r| r.volatility),
                    sharpe_ratio = ?risk.and_then(|r| r.sharpe_ratio),
                    penalty,
                    "Outside risk tolerance"
                );
                score = CompositeScore::new(
                    score.ticker,
                    score.strength - penalty,
                    score.confidence,
                    score.contributors,
                );
            }

            if score.confidence < self.confidence_floor {
                warn!(
                    ticker = %score.ticker,
                    confidence = score.confidence,
                    floor = self.confidence_floor,
                    "Insufficient confidence, excluding candidate"
                );
                aggregation.dropped.push(DroppedCandidate::new(
                    score.ticker.clone(),
                    DropReason::InsufficientConfidence {
                        confidence: score.confidence,
                        floor: self.confidence_floor,
                    },
                ));
                continue;
            }

            debug!(
                ticker = %score.ticker,
                strength = score.strength,
                confidence = score.confidence,
                contributors = score.contributors,
                "Composite score"
            );
            aggregation.scored.push(ScoredCandidate {
                candidate: analysis.candidate,
                score,
                signals,
                risk,
            });
        }

        aggregation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalyzerKind, AssetClass};

    fn signal(kind: AnalyzerKind, strength: f64, confidence: f64) -> AnalysisSignal {
        AnalysisSignal::new(kind, strength, confidence, "test")
    }

    fn aggregator() -> SignalAggregator {
        SignalAggregator::new(WeightTable::default(), ToleranceTable::default(), 0.2)
    }

    fn technical(volatility: f64, sharpe: f64) -> AnalysisSignal {
        signal(AnalyzerKind::Technical, 0.6, 0.9)
            .with_metric(metrics::VOLATILITY, volatility)
            .with_metric(metrics::SHARPE_RATIO, sharpe)
    }

    #[test]
    fn test_uniform_signals_pass_through() {
        let signals = [
            signal(AnalyzerKind::Fundamental, 0.8, 0.9),
            signal(AnalyzerKind::Technical, 0.8, 0.9),
            signal(AnalyzerKind::Sentiment, 0.8, 0.9),
        ];
        let score = aggregator().composite("AAA", RiskPreference::Conservative, &signals);
        assert!((score.strength - 0.8).abs() < 1e-12);
        assert!((score.confidence - 0.9).abs() < 1e-12);
        assert_eq!(score.contributors, 3);
    }

    #[test]
    fn test_missing_analyzer_lowers_confidence() {
        let signals = [
            signal(AnalyzerKind::Technical, 0.5, 1.0),
            AnalysisSignal::failed(AnalyzerKind::Fundamental, "timed out"),
        ];
        let score = aggregator().composite("AAA", RiskPreference::Moderate, &signals);
        // only the 0.40 technical weight was satisfied
        assert!((score.confidence - 0.4).abs() < 1e-12);
        assert!((score.strength - 0.5).abs() < 1e-12);
        assert_eq!(score.contributors, 1);
    }

    #[test]
    fn test_weighting_follows_preference() {
        let signals = [
            signal(AnalyzerKind::Fundamental, 1.0, 1.0),
            signal(AnalyzerKind::Technical, -1.0, 1.0),
        ];
        let conservative = aggregator().composite("AAA", RiskPreference::Conservative, &signals);
        let aggressive = aggregator().composite("AAA", RiskPreference::Aggressive, &signals);
        assert!(conservative.strength > 0.0);
        assert!(aggressive.strength < 0.0);
    }

    #[test]
    fn test_floor_excludes_weak_candidates() {
        let analyzed = vec![
            CandidateAnalysis {
                candidate: CandidateAsset::new("WEAK", AssetClass::Stocks),
                signals: vec![signal(AnalyzerKind::Sentiment, 0.9, 0.5)],
            },
            CandidateAnalysis {
                candidate: CandidateAsset::new("OK", AssetClass::Stocks),
                signals: vec![signal(AnalyzerKind::Technical, 0.3, 0.8)],
            },
        ];

        let aggregation = aggregator().aggregate(RiskPreference::Moderate, analyzed);
        assert_eq!(aggregation.scored.len(), 1);
        assert_eq!(aggregation.scored[0].candidate.ticker, "OK");
        assert_eq!(aggregation.dropped[0].ticker, "WEAK");
        assert!(matches!(
            aggregation.dropped[0].reason,
            DropReason::InsufficientConfidence { .. }
        ));
    }

    #[test]
    fn test_out_of_tolerance_candidate_is_penalized() {
        let analyzed = vec![
            CandidateAnalysis {
                candidate: CandidateAsset::new("CALM", AssetClass::Stocks),
                signals: vec![technical(0.12, 0.8)],
            },
            CandidateAnalysis {
                candidate: CandidateAsset::new("WILD", AssetClass::Stocks),
                signals: vec![technical(0.55, 0.8)],
            },
        ];

        let aggregation = aggregator().aggregate(RiskPreference::Conservative, analyzed);
        assert!(aggregation.dropped.is_empty());
        let calm = &aggregation.scored[0];
        let wild = &aggregation.scored[1];
        assert!(calm.risk.unwrap().within_tolerance);
        assert!((calm.score.strength - 0.6).abs() < 1e-12);
        assert!(!wild.risk.unwrap().within_tolerance);
        assert!((wild.score.strength - 0.18).abs() < 1e-12);
        assert!(wild.risk.unwrap().summary().contains("outside tolerance"));
    }

    #[test]
    fn test_tolerance_follows_preference() {
        let signals = [technical(0.35, 0.1)];
        let agg = aggregator();
        assert!(!agg.assess(RiskPreference::Conservative, &signals).unwrap().within_tolerance);
        assert!(!agg.assess(RiskPreference::Moderate, &signals).unwrap().within_tolerance);
        assert!(agg.assess(RiskPreference::Aggressive, &signals).unwrap().within_tolerance);

        let unmeasured = [signal(AnalyzerKind::Technical, 0.6, 0.9)];
        assert!(agg.assess(RiskPreference::Conservative, &unmeasured).is_none());
    }
}
