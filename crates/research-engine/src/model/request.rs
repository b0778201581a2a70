//! Research request and its enumerations

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, Result};

/// Asset classes a request can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Stocks,
    Etfs,
    Crypto,
    Bonds,
    MutualFunds,
}

impl AssetClass {
    pub const ALL: [Self; 5] = [
        Self::Stocks,
        Self::Etfs,
        Self::Crypto,
        Self::Bonds,
        Self::MutualFunds,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stocks => "stocks",
            Self::Etfs => "etfs",
            Self::Crypto => "crypto",
            Self::Bonds => "bonds",
            Self::MutualFunds => "mutual_funds",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "stock" | "stocks" => Ok(Self::Stocks),
            "etf" | "etfs" => Ok(Self::Etfs),
            "crypto" | "cryptos" | "cryptocurrency" => Ok(Self::Crypto),
            "bond" | "bonds" => Ok(Self::Bonds),
            "mutual_fund" | "mutual_funds" => Ok(Self::MutualFunds),
            other => Err(ResearchError::InvalidRequest(format!(
                "unknown asset class '{other}'"
            ))),
        }
    }
}

/// Investor risk preference
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskPreference {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl RiskPreference {
    pub const ALL: [Self; 3] = [Self::Conservative, Self::Moderate, Self::Aggressive];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Moderate => "moderate",
            Self::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for RiskPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskPreference {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "moderate" => Ok(Self::Moderate),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(ResearchError::InvalidRequest(format!(
                "unknown risk preference '{other}'"
            ))),
        }
    }
}

/// A validated research request.
///
/// Fields are private so a request cannot change after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RequestFields")]
pub struct ResearchRequest {
    asset_classes: Vec<AssetClass>,
    budget: Decimal,
    risk_preference: RiskPreference,
    tickers: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct RequestFields {
    asset_classes: Vec<AssetClass>,
    budget: Decimal,
    #[serde(default)]
    risk_preference: RiskPreference,
    #[serde(default)]
    tickers: Option<Vec<String>>,
}

impl TryFrom<RequestFields> for ResearchRequest {
    type Error = ResearchError;

    fn try_from(fields: RequestFields) -> Result<Self> {
        Self::new(
            fields.asset_classes,
            fields.budget,
            fields.risk_preference,
            fields.tickers,
        )
    }
}

impl ResearchRequest {
    /// Validate and build a request.
    ///
    /// Asset classes are deduplicated in the order given and must not be
    /// empty. The budget is checked later by the allocation stage, which owns
    /// that failure.
    pub fn new(
        asset_classes: impl IntoIterator<Item = AssetClass>,
        budget: Decimal,
        risk_preference: RiskPreference,
        tickers: Option<Vec<String>>,
    ) -> Result<Self> {
        let mut classes: Vec<AssetClass> = Vec::new();
        for class in asset_classes {
            if !classes.contains(&class) {
                classes.push(class);
            }
        }

        if classes.is_empty() {
            return Err(ResearchError::InvalidRequest(
                "at least one asset class is required".to_string(),
            ));
        }

        let tickers = tickers.filter(|list| list.iter().any(|t| !t.trim().is_empty()));

        Ok(Self {
            asset_classes: classes,
            budget,
            risk_preference,
            tickers,
        })
    }

    pub fn asset_classes(&self) -> &[AssetClass] {
        &self.asset_classes
    }

    pub fn budget(&self) -> Decimal {
        self.budget
    }

    pub fn risk_preference(&self) -> RiskPreference {
        self.risk_preference
    }

    /// Explicit tickers, when the caller named any
    pub fn tickers(&self) -> Option<&[String]> {
        self.tickers.as_deref()
    }
}
