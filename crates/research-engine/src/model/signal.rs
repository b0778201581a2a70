//! Candidates, analysis signals and composite scores

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::AssetClass;

/// An asset under consideration in one request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateAsset {
    pub ticker: String,
    pub asset_class: AssetClass,
    pub tradable: bool,
}

impl CandidateAsset {
    pub fn new(ticker: impl Into<String>, asset_class: AssetClass) -> Self {
        Self {
            ticker: ticker.into(),
            asset_class,
            tradable: true,
        }
    }
}

/// Analyzer variants; the weight table is keyed by these
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    Fundamental,
    Technical,
    Sentiment,
}

impl AnalyzerKind {
    pub const ALL: [Self; 3] = [Self::Fundamental, Self::Technical, Self::Sentiment];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Fundamental => "Fundamental",
            Self::Technical => "Technical",
            Self::Sentiment => "Sentiment",
        }
    }
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one analyzer attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignalStatus {
    Succeeded,
    Failed { reason: String },
}

/// Well-known metric keys shared between analyzers and the sizing stage
pub mod metrics {
    pub const CURRENT_PRICE: &str = "current_price";
    pub const HISTORICAL_RETURN: &str = "historical_return";
    pub const VOLATILITY: &str = "volatility";
    pub const SHARPE_RATIO: &str = "sharpe_ratio";
    pub const MAX_DRAWDOWN: &str = "max_drawdown";
    /// +1 buy, 0 hold, -1 sell
    pub const CONSENSUS_DIRECTION: &str = "consensus_direction";
    pub const CONSENSUS_STRENGTH: &str = "consensus_strength";
    pub const PE_RATIO: &str = "pe_ratio";
    pub const MARKET_CAP: &str = "market_cap";
    pub const DIVIDEND_YIELD: &str = "dividend_yield";
    pub const RANGE_POSITION_52W: &str = "range_position_52w";
}

/// One directional signal for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSignal {
    pub kind: AnalyzerKind,
    /// Direction and magnitude, clamped to [-1, 1]
    pub strength: f64,
    /// Clamped to [0, 1]
    pub confidence: f64,
    pub rationale: String,
    pub metrics: BTreeMap<String, f64>,
    pub status: SignalStatus,
}

impl AnalysisSignal {
    /// A successful signal; out-of-range inputs are clamped
    pub fn new(
        kind: AnalyzerKind,
        strength: f64,
        confidence: f64,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            strength: clamp_unit(strength, -1.0),
            confidence: clamp_unit(confidence, 0.0),
            rationale: rationale.into(),
            metrics: BTreeMap::new(),
            status: SignalStatus::Succeeded,
        }
    }

    /// A failed attempt; carries no strength or confidence
    pub fn failed(kind: AnalyzerKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            strength: 0.0,
            confidence: 0.0,
            rationale: String::new(),
            metrics: BTreeMap::new(),
            status: SignalStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        if value.is_finite() {
            self.metrics.insert(key.into(), value);
        }
        self
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, SignalStatus::Succeeded)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            SignalStatus::Failed { reason } => Some(reason),
            SignalStatus::Succeeded => None,
        }
    }
}

/// NaN collapses to zero
fn clamp_unit(value: f64, lower: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(lower, 1.0)
    }
}

/// Risk-weighted combination of a candidate's surviving signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub ticker: String,
    /// In [-1, 1]
    pub strength: f64,
    /// In [0, 1]
    pub confidence: f64,
    pub contributors: usize,
}

impl CompositeScore {
    pub fn new(ticker: impl Into<String>, strength: f64, confidence: f64, contributors: usize) -> Self {
        Self {
            ticker: ticker.into(),
            strength: clamp_unit(strength, -1.0),
            confidence: clamp_unit(confidence, 0.0),
            contributors,
        }
    }

    /// Conviction used for sizing: strength scaled by confidence
    pub fn conviction(&self) -> f64 {
        self.strength * self.confidence
    }
}
