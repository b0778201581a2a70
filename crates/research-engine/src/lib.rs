//! Investment research engine
//!
//! Turns a research request (asset classes, budget, risk preference) into a
//! ranked and sized list of picks with a markdown narrative. The pipeline:
//!
//! - Universe construction from a brokerage catalog and tradability filter
//! - Fundamental, technical and sentiment analyzers run over a bounded pool
//! - Risk-weighted aggregation into composite scores with a confidence floor
//!   and a per-preference volatility and Sharpe tolerance
//! - Ranking and budget allocation under a per-pick cap
//! - Report compilation and optional persistence
//!
//! Analyzer failures degrade a candidate instead of failing the request.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use research_engine::{
//!     AlphaVantageFundamentals, AssetClass, ResearchConfig, ResearchEngine, ResearchRequest,
//!     RiskPreference, YahooMarketData,
//! };
//! use rust_decimal_macros::dec;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = ResearchEngine::builder()
//!         .config(ResearchConfig::default().with_env_overrides()?)
//!         .market_data(Arc::new(
//!             YahooMarketData::new().with_fundamentals(Arc::new(AlphaVantageFundamentals::from_env()?)),
//!         ))
//!         .build()?;
//!
//!     let request = ResearchRequest::new(
//!         [AssetClass::Stocks, AssetClass::Etfs],
//!         dec!(5000),
//!         RiskPreference::Moderate,
//!         None,
//!     )?;
//!
//!     let report = engine.research(&request).await?;
//!     println!("{}", report.narrative);
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod aggregator;
pub mod allocation;
pub mod api;
pub mod compiler;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod model;
pub mod quant;
pub mod ranking;
pub mod store;
pub mod universe;

pub use agents::{Analyzer, FundamentalAnalyzer, SentimentAnalyzer, TechnicalAnalyzer};
pub use api::{
    AlphaVantageFundamentals, Fundamentals, FundamentalsSource, HistoryPeriod, MarketDataProvider,
    PricePoint, Quote, YahooMarketData,
};
pub use compiler::ReportStamp;
pub use config::{ResearchConfig, RiskBands, RiskTolerance, ToleranceTable, WeightTable};
pub use engine::{ResearchEngine, ResearchEngineBuilder};
pub use error::{AnalyzerError, ProviderError, ResearchError, Result, StoreError};
pub use model::{
    AnalysisSignal, AnalyzerKind, AssetClass, CandidateAsset, DropReason, DroppedCandidate, Pick,
    ResearchReport, ResearchRequest, RiskLevel, RiskPreference,
};
pub use store::{InMemoryReportStore, ReportStore};
pub use universe::{BrokerageTradability, Catalog, TradabilityFilter};
