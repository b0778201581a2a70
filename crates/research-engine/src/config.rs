//! Configuration for research generation

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::HistoryPeriod;
use crate::error::{ResearchError, Result};
use crate::model::{AnalyzerKind, RiskPreference};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Upper bound on picks per report
pub const MAX_PICKS: usize = 10;

/// Analyzer weights keyed by risk preference and analyzer kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable {
    weights: BTreeMap<RiskPreference, BTreeMap<AnalyzerKind, f64>>,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self::new()
            .with(RiskPreference::Conservative, AnalyzerKind::Fundamental, 0.55)
            .with(RiskPreference::Conservative, AnalyzerKind::Technical, 0.30)
            .with(RiskPreference::Conservative, AnalyzerKind::Sentiment, 0.15)
            .with(RiskPreference::Moderate, AnalyzerKind::Fundamental, 0.40)
            .with(RiskPreference::Moderate, AnalyzerKind::Technical, 0.40)
            .with(RiskPreference::Moderate, AnalyzerKind::Sentiment, 0.20)
            .with(RiskPreference::Aggressive, AnalyzerKind::Fundamental, 0.25)
            .with(RiskPreference::Aggressive, AnalyzerKind::Technical, 0.50)
            .with(RiskPreference::Aggressive, AnalyzerKind::Sentiment, 0.25)
    }
}

impl WeightTable {
    /// An empty table
    pub fn new() -> Self {
        Self {
            weights: BTreeMap::new(),
        }
    }

    /// Set one weight
    pub fn with(mut self, preference: RiskPreference, kind: AnalyzerKind, weight: f64) -> Self {
        self.weights
            .entry(preference)
            .or_default()
            .insert(kind, weight);
        self
    }

    /// Weight of an analyzer under a preference; unlisted kinds weigh zero
    pub fn weight(&self, preference: RiskPreference, kind: AnalyzerKind) -> f64 {
        self.weights
            .get(&preference)
            .and_then(|row| row.get(&kind))
            .copied()
            .unwrap_or(0.0)
    }

    /// Total intended weight for a preference
    pub fn total(&self, preference: RiskPreference) -> f64 {
        self.weights
            .get(&preference)
            .map(|row| row.values().sum())
            .unwrap_or(0.0)
    }

    /// The weight vector for a preference, in analyzer-kind order
    pub fn row(&self, preference: RiskPreference) -> Vec<(AnalyzerKind, f64)> {
        self.weights
            .get(&preference)
            .map(|row| row.iter().map(|(k, w)| (*k, *w)).collect())
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        for preference in RiskPreference::ALL {
            let Some(row) = self.weights.get(&preference) else {
                return Err(ResearchError::Config(format!(
                    "missing analyzer weights for {preference}"
                )));
            };

            if let Some((kind, weight)) = row.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
                return Err(ResearchError::Config(format!(
                    "weight for {kind} under {preference} must be non-negative, got {weight}"
                )));
            }

            let total: f64 = row.values().sum();
            if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(ResearchError::Config(format!(
                    "weights for {preference} must sum to 1, got {total}"
                )));
            }
        }
        Ok(())
    }
}

/// Fixed thresholds for banding picks into risk levels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskBands {
    /// Annualized volatility below this is low risk
    pub low_volatility: f64,
    /// Annualized volatility at or above this is high risk
    pub high_volatility: f64,
    /// Without volatility: conviction at or above this is low risk
    pub low_risk_conviction: f64,
    /// Without volatility: conviction below this is high risk
    pub high_risk_conviction: f64,
}

impl Default for RiskBands {
    fn default() -> Self {
        Self {
            low_volatility: 0.15,
            high_volatility: 0.30,
            low_risk_conviction: 0.5,
            high_risk_conviction: 0.2,
        }
    }
}

/// Volatility and Sharpe limits for one risk preference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskTolerance {
    /// Annualized volatility above this is outside tolerance
    pub max_volatility: f64,
    /// Sharpe ratio below this is outside tolerance
    pub min_sharpe: f64,
    /// Subtracted from composite strength when outside tolerance
    pub penalty: f64,
}

impl RiskTolerance {
    pub fn new(max_volatility: f64, min_sharpe: f64, penalty: f64) -> Self {
        Self {
            max_volatility,
            min_sharpe,
            penalty,
        }
    }

    /// Whether the reported metrics fit; a missing metric is not held against the candidate
    pub fn admits(&self, volatility: Option<f64>, sharpe: Option<f64>) -> bool {
        volatility.is_none_or(|v| v <= self.max_volatility)
            && sharpe.is_none_or(|s| s >= self.min_sharpe)
    }
}

/// Risk tolerance keyed by risk preference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToleranceTable {
    tolerances: BTreeMap<RiskPreference, RiskTolerance>,
}

impl Default for ToleranceTable {
    fn default() -> Self {
        Self::new()
            .with(RiskPreference::Conservative, RiskTolerance::new(0.2, 0.5, 0.42))
            .with(RiskPreference::Moderate, RiskTolerance::new(0.4, 0.3, 0.35))
            .with(RiskPreference::Aggressive, RiskTolerance::new(0.8, 0.0, 0.28))
    }
}

impl ToleranceTable {
    /// An empty table
    pub fn new() -> Self {
        Self {
            tolerances: BTreeMap::new(),
        }
    }

    pub fn with(mut self, preference: RiskPreference, tolerance: RiskTolerance) -> Self {
        self.tolerances.insert(preference, tolerance);
        self
    }

    pub fn get(&self, preference: RiskPreference) -> Option<&RiskTolerance> {
        self.tolerances.get(&preference)
    }

    pub fn validate(&self) -> Result<()> {
        for preference in RiskPreference::ALL {
            let Some(tolerance) = self.tolerances.get(&preference) else {
                return Err(ResearchError::Config(format!(
                    "missing risk tolerance for {preference}"
                )));
            };
            if !(tolerance.max_volatility.is_finite() && tolerance.max_volatility > 0.0) {
                return Err(ResearchError::Config(format!(
                    "max_volatility under {preference} must be positive"
                )));
            }
            if !tolerance.min_sharpe.is_finite() {
                return Err(ResearchError::Config(format!(
                    "min_sharpe under {preference} must be finite"
                )));
            }
            if !(0.0..=2.0).contains(&tolerance.penalty) {
                return Err(ResearchError::Config(format!(
                    "tolerance penalty under {preference} must be within [0, 2]"
                )));
            }
        }
        Ok(())
    }
}

/// Durations as (fractional) seconds in configuration files
mod duration_secs {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

/// Configuration for one research engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Analyzer weights per risk preference
    pub weights: WeightTable,

    /// Candidates whose weighted confidence falls below this are not ranked
    pub confidence_floor: f64,

    /// Maximum analyzer calls in flight for one request
    pub pool_size: usize,

    /// Timeout for a single analyzer call
    #[serde(rename = "analyzer_timeout_secs", with = "duration_secs")]
    pub analyzer_timeout: Duration,

    /// Overall deadline for the analysis stage
    #[serde(rename = "request_deadline_secs", with = "duration_secs")]
    pub request_deadline: Duration,

    /// Maximum number of picks in a report
    pub max_picks: usize,

    /// Largest share of the budget a single pick may take
    pub max_allocation_fraction: Decimal,

    /// Decimal places allocation amounts are rounded to
    pub currency_scale: u32,

    /// Risk level banding thresholds
    pub risk_bands: RiskBands,

    /// Volatility and Sharpe limits per risk preference
    pub risk_tolerance: ToleranceTable,

    /// Price history window requested from the provider
    pub history_period: HistoryPeriod,

    /// Minimum closes the technical analyzer needs
    pub min_history_points: usize,

    /// Cap on candidates expanded from asset classes
    pub max_universe: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            weights: WeightTable::default(),
            confidence_floor: 0.20,
            pool_size: 8,
            analyzer_timeout: Duration::from_secs(10),
            request_deadline: Duration::from_secs(60),
            max_picks: 10,
            max_allocation_fraction: Decimal::new(25, 2),
            currency_scale: 2,
            risk_bands: RiskBands::default(),
            risk_tolerance: ToleranceTable::default(),
            history_period: HistoryPeriod::OneYear,
            min_history_points: 60,
            max_universe: 50,
        }
    }
}

impl ResearchConfig {
    /// Create a new configuration builder
    pub fn builder() -> ResearchConfigBuilder {
        ResearchConfigBuilder::default()
    }

    /// Load a JSON configuration file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ResearchError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            ResearchError::Config(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `RESEARCH_*` environment overrides
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(v) = env_parse::<usize>("RESEARCH_POOL_SIZE")? {
            self.pool_size = v;
        }
        if let Some(v) = env_parse::<u64>("RESEARCH_ANALYZER_TIMEOUT_SECS")? {
            self.analyzer_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("RESEARCH_REQUEST_DEADLINE_SECS")? {
            self.request_deadline = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<f64>("RESEARCH_CONFIDENCE_FLOOR")? {
            self.confidence_floor = v;
        }
        if let Some(v) = env_parse::<Decimal>("RESEARCH_MAX_ALLOCATION_FRACTION")? {
            self.max_allocation_fraction = v;
        }
        if let Some(v) = env_parse::<usize>("RESEARCH_MAX_PICKS")? {
            self.max_picks = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.risk_tolerance.validate()?;

        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return Err(ResearchError::Config(
                "confidence_floor must be within [0, 1]".to_string(),
            ));
        }

        if self.pool_size == 0 {
            return Err(ResearchError::Config(
                "pool_size must be greater than 0".to_string(),
            ));
        }

        if self.max_picks == 0 || self.max_picks > MAX_PICKS {
            return Err(ResearchError::Config(format!(
                "max_picks must be within [1, {MAX_PICKS}]"
            )));
        }

        if self.max_allocation_fraction <= Decimal::ZERO
            || self.max_allocation_fraction > Decimal::ONE
        {
            return Err(ResearchError::Config(
                "max_allocation_fraction must be within (0, 1]".to_string(),
            ));
        }

        if self.analyzer_timeout.is_zero() || self.request_deadline.is_zero() {
            return Err(ResearchError::Config(
                "timeouts must be greater than 0".to_string(),
            ));
        }

        let bands = &self.risk_bands;
        if bands.low_volatility > bands.high_volatility
            || bands.high_risk_conviction > bands.low_risk_conviction
        {
            return Err(ResearchError::Config(
                "risk bands must be ordered low < high".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ResearchError::Config(format!("{key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Builder for ResearchConfig
#[derive(Debug, Default)]
pub struct ResearchConfigBuilder {
    weights: Option<WeightTable>,
    confidence_floor: Option<f64>,
    pool_size: Option<usize>,
    analyzer_timeout: Option<Duration>,
    request_deadline: Option<Duration>,
    max_picks: Option<usize>,
    max_allocation_fraction: Option<Decimal>,
    currency_scale: Option<u32>,
    risk_bands: Option<RiskBands>,
    risk_tolerance: Option<ToleranceTable>,
    history_period: Option<HistoryPeriod>,
    min_history_points: Option<usize>,
    max_universe: Option<usize>,
}

impl ResearchConfigBuilder {
    pub fn weights(mut self, weights: WeightTable) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn confidence_floor(mut self, floor: f64) -> Self {
        self.confidence_floor = Some(floor);
        self
    }

    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = Some(size);
        self
    }

    pub fn analyzer_timeout(mut self, timeout: Duration) -> Self {
        self.analyzer_timeout = Some(timeout);
        self
    }

    pub fn request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = Some(deadline);
        self
    }

    pub fn max_picks(mut self, picks: usize) -> Self {
        self.max_picks = Some(picks);
        self
    }

    pub fn max_allocation_fraction(mut self, fraction: Decimal) -> Self {
        self.max_allocation_fraction = Some(fraction);
        self
    }

    pub fn currency_scale(mut self, scale: u32) -> Self {
        self.currency_scale = Some(scale);
        self
    }

    pub fn risk_bands(mut self, bands: RiskBands) -> Self {
        self.risk_bands = Some(bands);
        self
    }

    pub fn risk_tolerance(mut self, tolerance: ToleranceTable) -> Self {
        self.risk_tolerance = Some(tolerance);
        self
    }

    pub fn history_period(mut self, period: HistoryPeriod) -> Self {
        self.history_period = Some(period);
        self
    }

    pub fn min_history_points(mut self, points: usize) -> Self {
        self.min_history_points = Some(points);
        self
    }

    pub fn max_universe(mut self, size: usize) -> Self {
        self.max_universe = Some(size);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ResearchConfig> {
        let defaults = ResearchConfig::default();

        let config = ResearchConfig {
            weights: self.weights.unwrap_or(defaults.weights),
            confidence_floor: self.confidence_floor.unwrap_or(defaults.confidence_floor),
            pool_size: self.pool_size.unwrap_or(defaults.pool_size),
            analyzer_timeout: self.analyzer_timeout.unwrap_or(defaults.analyzer_timeout),
            request_deadline: self.request_deadline.unwrap_or(defaults.request_deadline),
            max_picks: self.max_picks.unwrap_or(defaults.max_picks),
            max_allocation_fraction: self
                .max_allocation_fraction
                .unwrap_or(defaults.max_allocation_fraction),
            currency_scale: self.currency_scale.unwrap_or(defaults.currency_scale),
            risk_bands: self.risk_bands.unwrap_or(defaults.risk_bands),
            risk_tolerance: self.risk_tolerance.unwrap_or(defaults.risk_tolerance),
            history_period: self.history_period.unwrap_or(defaults.history_period),
            min_history_points: self.min_history_points.unwrap_or(defaults.min_history_points),
            max_universe: self.max_universe.unwrap_or(defaults.max_universe),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = ResearchConfig::default();
        assert_eq!(config.max_picks, 10);
        assert_eq!(config.max_allocation_fraction, dec!(0.25));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_weights_favor_fundamentals_when_conservative() {
        let weights = WeightTable::default();
        assert!(
            weights.weight(RiskPreference::Conservative, AnalyzerKind::Fundamental)
                > weights.weight(RiskPreference::Conservative, AnalyzerKind::Technical)
        );
        assert!(
            weights.weight(RiskPreference::Aggressive, AnalyzerKind::Technical)
                > weights.weight(RiskPreference::Aggressive, AnalyzerKind::Fundamental)
        );
        for preference in RiskPreference::ALL {
            assert!((weights.total(preference) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_config_builder() {
        let config = ResearchConfig::builder()
            .pool_size(2)
            .max_allocation_fraction(dec!(0.6))
            .analyzer_timeout(Duration::from_millis(250))
            .build()
            .unwrap();

        assert_eq!(config.pool_size, 2);
        assert_eq!(config.max_allocation_fraction, dec!(0.6));
        assert_eq!(config.analyzer_timeout, Duration::from_millis(250));
        assert_eq!(config.max_picks, 10);
    }

    #[test]
    fn test_validation_rejects_unbalanced_weights() {
        let weights = WeightTable::default().with(
            RiskPreference::Moderate,
            AnalyzerKind::Sentiment,
            0.5,
        );
        let err = ResearchConfig::builder().weights(weights).build().unwrap_err();
        assert!(err.to_string().contains("moderate"));
    }

    #[test]
    fn test_validation_rejects_bad_limits() {
        assert!(ResearchConfig::builder().pool_size(0).build().is_err());
        assert!(
            ResearchConfig::builder()
                .max_allocation_fraction(dec!(1.5))
                .build()
                .is_err()
        );
        assert!(ResearchConfig::builder().confidence_floor(1.2).build().is_err());
        assert!(ResearchConfig::builder().max_picks(MAX_PICKS).build().is_ok());
        assert!(ResearchConfig::builder().max_picks(11).build().is_err());
        assert!(ResearchConfig::builder().max_picks(0).build().is_err());
    }

    #[test]
    fn test_tolerance_defaults_tighten_with_caution() {
        let table = ToleranceTable::default();
        let conservative = table.get(RiskPreference::Conservative).unwrap();
        let aggressive = table.get(RiskPreference::Aggressive).unwrap();
        assert_eq!(conservative.max_volatility, 0.2);
        assert_eq!(conservative.min_sharpe, 0.5);
        assert_eq!(aggressive.max_volatility, 0.8);

        assert!(conservative.admits(Some(0.15), Some(0.9)));
        assert!(!conservative.admits(Some(0.35), Some(0.9)));
        assert!(!conservative.admits(Some(0.15), Some(0.1)));
        assert!(aggressive.admits(Some(0.35), Some(0.1)));
        assert!(conservative.admits(None, None));
    }

    #[test]
    fn test_validation_rejects_incomplete_tolerance() {
        let partial = ToleranceTable::new()
            .with(RiskPreference::Moderate, RiskTolerance::new(0.4, 0.3, 0.35));
        let err = ResearchConfig::builder()
            .risk_tolerance(partial)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("conservative"));
    }

    #[test]
    fn test_durations_serialize_as_seconds() {
        let config = ResearchConfig::builder()
            .analyzer_timeout(Duration::from_millis(2500))
            .build()
            .unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["analyzer_timeout_secs"], serde_json::json!(2.5));
        assert_eq!(json["request_deadline_secs"], serde_json::json!(60.0));
        assert!(json.get("analyzer_timeout").is_none());

        let parsed: ResearchConfig =
            serde_json::from_str(r#"{"analyzer_timeout_secs": 4, "request_deadline_secs": 30}"#)
                .unwrap();
        assert_eq!(parsed.analyzer_timeout, Duration::from_secs(4));
        assert_eq!(parsed.request_deadline, Duration::from_secs(30));

        let reparsed: ResearchConfig = serde_json::from_value(json).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_json_round_trip_with_defaults() {
        let json = r#"{"pool_size": 3, "weights": {
            "conservative": {"fundamental": 0.6, "technical": 0.3, "sentiment": 0.1},
            "moderate": {"fundamental": 0.4, "technical": 0.4, "sentiment": 0.2},
            "aggressive": {"fundamental": 0.2, "technical": 0.5, "sentiment": 0.3}
        }}"#;
        let config: ResearchConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.max_picks, 10);
        assert!(
            (config
                .weights
                .weight(RiskPreference::Conservative, AnalyzerKind::Fundamental)
                - 0.6)
                .abs()
                < 1e-12
        );
        assert!(config.validate().is_ok());
    }
}
