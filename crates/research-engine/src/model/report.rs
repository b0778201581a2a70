//! Report value types handed back to the caller

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AnalyzerKind, AssetClass, RiskPreference};

/// Banded risk of a pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// A ranked, sized recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    /// 1-based, contiguous
    pub rank: usize,
    pub ticker: String,
    pub asset_class: AssetClass,
    pub current_price: f64,
    pub expected_yield: f64,
    pub strength: f64,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub allocation_percent: Decimal,
    pub allocation_amount: Decimal,
    pub rationale: String,
}

/// Why a candidate left the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    /// Explicit ticker rejected by the tradability filter
    NotTradable,
    /// Every analyzer failed or timed out
    NoSuccessfulAnalyzers {
        failures: Vec<(AnalyzerKind, String)>,
    },
    /// Weighted confidence fell below the floor
    InsufficientConfidence { confidence: f64, floor: f64 },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotTradable => write!(f, "not tradable on the target brokerage"),
            Self::NoSuccessfulAnalyzers { failures } => {
                write!(f, "no analyzer succeeded")?;
                if !failures.is_empty() {
                    let detail = failures
                        .iter()
                        .map(|(kind, reason)| format!("{kind}: {reason}"))
                        .collect::<Vec<_>>()
                        .join("; ");
                    write!(f, " ({detail})")?;
                }
                Ok(())
            }
            Self::InsufficientConfidence { confidence, floor } => write!(
                f,
                "insufficient confidence ({:.0}% below the {:.0}% floor)",
                confidence * 100.0,
                floor * 100.0
            ),
        }
    }
}

/// A candidate excluded from the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedCandidate {
    pub ticker: String,
    pub reason: DropReason,
}

impl DroppedCandidate {
    pub fn new(ticker: impl Into<String>, reason: DropReason) -> Self {
        Self {
            ticker: ticker.into(),
            reason,
        }
    }
}

/// Final output of one research request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub asset_classes: Vec<AssetClass>,
    pub budget: Decimal,
    pub risk_preference: RiskPreference,
    /// Universe size after tradability filtering
    pub universe_size: usize,
    pub picks: Vec<Pick>,
    pub dropped: Vec<DroppedCandidate>,
    pub narrative: String,
}

impl ResearchReport {
    pub fn total_allocated(&self) -> Decimal {
        self.picks.iter().map(|p| p.allocation_amount).sum()
    }

    pub fn pick(&self, ticker: &str) -> Option<&Pick> {
        self.picks.iter().find(|p| p.ticker == ticker)
    }

    pub fn is_dropped(&self, ticker: &str) -> bool {
        self.dropped.iter().any(|d| d.ticker == ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_reason_display() {
        let reason = DropReason::NoSuccessfulAnalyzers {
            failures: vec![
                (AnalyzerKind::Fundamental, "timed out after 5s".to_string()),
                (AnalyzerKind::Technical, "provider error".to_string()),
            ],
        };
        assert_eq!(
            reason.to_string(),
            "no analyzer succeeded (Fundamental: timed out after 5s; Technical: provider error)"
        );

        let reason = DropReason::InsufficientConfidence {
            confidence: 0.12,
            floor: 0.2,
        };
        assert_eq!(
            reason.to_string(),
            "insufficient confidence (12% below the 20% floor)"
        );
    }
}
