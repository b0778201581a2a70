//! Error types for research generation

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::model::AssetClass;

/// Market data provider errors
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Provider has no data for the ticker
    #[error("Data not available for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    /// Unknown or malformed ticker
    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),

    /// Rate limit exceeded for the provider
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Upstream call failed
    #[error("Upstream error from {provider}: {message}")]
    Upstream { provider: String, message: String },
}

/// Failure of a single (candidate, analyzer) call.
///
/// These never surface to the caller of a research request; the coordinator
/// converts them into failed signals.
#[derive(Debug, Clone, Error)]
pub enum AnalyzerError {
    /// Market data provider failed
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Call exceeded the per-call timeout
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Not enough input to produce a signal
    #[error("insufficient data for {ticker}: {reason}")]
    InsufficientData { ticker: String, reason: String },

    /// Technical indicator calculation error
    #[error("indicator error: {0}")]
    Indicator(String),
}

/// Report persistence errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Backing store cannot be reached
    #[error("report store unavailable: {0}")]
    Unavailable(String),

    /// Report could not be encoded
    #[error("report serialization failed: {0}")]
    Serialization(String),
}

/// Pipeline stage a fatal error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchStage {
    Request,
    Universe,
    Allocation,
}

impl fmt::Display for ResearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "request validation"),
            Self::Universe => write!(f, "universe construction"),
            Self::Allocation => write!(f, "allocation"),
        }
    }
}

/// Why a budget could not be allocated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfeasibleReason {
    /// Budget is zero or negative
    NonPositiveBudget,
    /// No candidate survived aggregation
    NoPicks,
    /// Every pick sits at its cap and the caps sum to less than the budget
    CapsBelowBudget,
    /// Budget too large to size in decimal arithmetic
    BudgetOutOfRange,
}

impl fmt::Display for InfeasibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveBudget => write!(f, "budget must be greater than zero"),
            Self::NoPicks => write!(f, "no candidate survived analysis"),
            Self::CapsBelowBudget => {
                write!(f, "per-pick caps cannot absorb the full budget")
            }
            Self::BudgetOutOfRange => write!(f, "budget is too large to allocate"),
        }
    }
}

/// Request-level research errors
#[derive(Debug, Error)]
pub enum ResearchError {
    /// Request failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No tradable candidates remain
    #[error("No tradable candidates for asset classes [{}]", join_classes(.asset_classes))]
    EmptyUniverse {
        asset_classes: Vec<AssetClass>,
        rejected_tickers: Vec<String>,
    },

    /// Budget cannot be allocated across the picks
    #[error("Allocation infeasible: {reason}")]
    AllocationInfeasible {
        reason: InfeasibleReason,
        tickers: Vec<String>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

fn join_classes(classes: &[AssetClass]) -> String {
    classes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ResearchError {
    /// Stage the error was raised in
    pub fn stage(&self) -> ResearchStage {
        match self {
            Self::InvalidRequest(_) | Self::Config(_) => ResearchStage::Request,
            Self::EmptyUniverse { .. } => ResearchStage::Universe,
            Self::AllocationInfeasible { .. } => ResearchStage::Allocation,
        }
    }

    /// Tickers affected by the failure
    pub fn affected_tickers(&self) -> &[String] {
        match self {
            Self::EmptyUniverse {
                rejected_tickers, ..
            } => rejected_tickers,
            Self::AllocationInfeasible { tickers, .. } => tickers,
            Self::InvalidRequest(_) | Self::Config(_) => &[],
        }
    }

    /// Message safe to show an end user
    pub fn user_message(&self) -> String {
        let mut message = format!("Research failed during {}: {}", self.stage(), self);
        let tickers = self.affected_tickers();
        if !tickers.is_empty() {
            message.push_str(&format!(" (affected: {})", tickers.join(", ")));
        }
        message
    }
}

/// Result type alias for research operations
pub type Result<T> = std::result::Result<T, ResearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::DataUnavailable {
            ticker: "AAPL".to_string(),
            reason: "No data found".to_string(),
        };
        assert_eq!(err.to_string(), "Data not available for AAPL: No data found");

        let err = ResearchError::EmptyUniverse {
            asset_classes: vec![AssetClass::Stocks, AssetClass::Crypto],
            rejected_tickers: vec![],
        };
        assert_eq!(
            err.to_string(),
            "No tradable candidates for asset classes [stocks, crypto]"
        );
    }

    #[test]
    fn test_provider_error_conversion() {
        let err: AnalyzerError = ProviderError::InvalidTicker("ZZZ".to_string()).into();
        assert!(matches!(err, AnalyzerError::Provider(_)));
        assert!(err.to_string().contains("ZZZ"));
    }

    #[test]
    fn test_user_message_names_stage_and_tickers() {
        let err = ResearchError::AllocationInfeasible {
            reason: InfeasibleReason::CapsBelowBudget,
            tickers: vec!["AAA".to_string(), "BBB".to_string()],
        };
        assert_eq!(err.stage(), ResearchStage::Allocation);

        let message = err.user_message();
        assert!(message.contains("allocation"));
        assert!(message.contains("AAA, BBB"));
    }
}
