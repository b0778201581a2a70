//! Analyzers that turn market data into directional signals

pub mod fundamental_analyzer;
pub mod sentiment_analyzer;
pub mod technical_analyzer;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::api::MarketDataProvider;
use crate::config::ResearchConfig;
use crate::error::AnalyzerError;
use crate::model::{AnalysisSignal, AnalyzerKind, CandidateAsset};

pub use fundamental_analyzer::FundamentalAnalyzer;
pub use sentiment_analyzer::SentimentAnalyzer;
pub use technical_analyzer::TechnicalAnalyzer;

/// One analysis strategy.
///
/// Implementations hold no per-request state and may be called for many
/// candidates concurrently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Which weight this analyzer's signals carry
    fn kind(&self) -> AnalyzerKind;

    /// Analyze one candidate
    async fn analyze(&self, candidate: &CandidateAsset) -> Result<AnalysisSignal, AnalyzerError>;
}

/// The fundamental, technical and sentiment analyzers over one provider.
///
/// The fundamental analyzer is left out when the provider has no source of
/// fundamentals; its weight then counts as unsatisfied.
pub fn default_analyzers(
    provider: Arc<dyn MarketDataProvider>,
    config: &ResearchConfig,
) -> Vec<Arc<dyn Analyzer>> {
    let mut analyzers: Vec<Arc<dyn Analyzer>> = Vec::with_capacity(3);
    if provider.provides_fundamentals() {
        analyzers.push(Arc::new(FundamentalAnalyzer::new(Arc::clone(&provider))));
    } else {
        warn!("Market data has no fundamentals source, fundamental analysis disabled");
    }
    analyzers.push(Arc::new(TechnicalAnalyzer::new(
        Arc::clone(&provider),
        config.history_period,
        config.min_history_points,
    )));
    analyzers.push(Arc::new(SentimentAnalyzer::new(provider)));
    analyzers
}

/// Map a 0..100 analyst score onto [-1, 1] around the neutral 50
pub(crate) fn strength_from_score(score: f64) -> f64 {
    ((score - 50.0) / 50.0).clamp(-1.0, 1.0)
}
