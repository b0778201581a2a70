//! Request to report orchestration

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::agents::{Analyzer, default_analyzers};
use crate::aggregator::SignalAggregator;
use crate::allocation::AllocationSizer;
use crate::api::MarketDataProvider;
use crate::compiler::{ReportCompiler, ReportInputs, ReportStamp};
use crate::config::ResearchConfig;
use crate::coordinator::AnalysisCoordinator;
use crate::error::{InfeasibleReason, ResearchError, Result};
use crate::model::{DropReason, DroppedCandidate, Pick, ResearchReport, ResearchRequest};
use crate::ranking;
use crate::store::ReportStore;
use crate::universe::{BrokerageTradability, Catalog, TradabilityFilter, UniverseBuilder};

/// Generates research reports
pub struct ResearchEngine {
    config: Arc<ResearchConfig>,
    universe: UniverseBuilder,
    coordinator: AnalysisCoordinator,
    aggregator: SignalAggregator,
    sizer: AllocationSizer,
    compiler: ReportCompiler,
    market_data: Option<Arc<dyn MarketDataProvider>>,
    store: Option<Arc<dyn ReportStore>>,
}

impl ResearchEngine {
    pub fn builder() -> ResearchEngineBuilder {
        ResearchEngineBuilder::default()
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Run a request with a fresh report id and the current time
    pub async fn research(&self, request: &ResearchRequest) -> Result<ResearchReport> {
        self.research_with(request, ReportStamp::now()).await
    }

    /// Run a request under a caller-supplied stamp
    pub async fn research_with(
        &self,
        request: &ResearchRequest,
        stamp: ReportStamp,
    ) -> Result<ResearchReport> {
        let preference = request.risk_preference();
        info!(
            report_id = %stamp.id,
            asset_classes = ?request.asset_classes(),
            budget = %request.budget(),
            risk = %preference,
            "Research started"
        );

        self.sizer.check_budget(request.budget())?;

        let universe = self.universe.build(request)?;
        let mut dropped: Vec<DroppedCandidate> = universe
            .rejected
            .iter()
            .map(|t| DroppedCandidate::new(t.clone(), DropReason::NotTradable))
            .collect();

        let outcome = self.coordinator.run(&universe.candidates).await;
        dropped.extend(outcome.dropped);

        let aggregation = self.aggregator.aggregate(preference, outcome.analyzed);
        dropped.extend(aggregation.dropped);

        let ranked = ranking::rank(aggregation.scored, self.config.max_picks);
        if ranked.is_empty() {
            return Err(ResearchError::AllocationInfeasible {
                reason: InfeasibleReason::NoPicks,
                tickers: dropped.iter().map(|d| d.ticker.clone()).collect(),
            });
        }
        info!(picks = ranked.len(), dropped = dropped.len(), "Candidates ranked");

        let mut picks = self.sizer.size(&ranked, request.budget())?;
        self.fill_missing_prices(&mut picks).await;

        let report = self.compiler.compile(
            ReportInputs {
                request,
                universe_size: universe.candidates.len(),
                picks,
                dropped,
                weights: self.config.weights.row(preference),
                deadline_exceeded: outcome.deadline_exceeded,
            },
            stamp,
        );

        if let Some(store) = &self.store {
            match store.save(&report).await {
                Ok(id) => info!(report_id = %id, "Report stored"),
                Err(e) => warn!(report_id = %report.id, error = %e, "Failed to store report"),
            }
        }

        info!(
            report_id = %report.id,
            picks = report.picks.len(),
            allocated = %report.total_allocated(),
            "Research complete"
        );
        Ok(report)
    }

    /// Look up prices for picks no analyzer priced
    async fn fill_missing_prices(&self, picks: &mut [Pick]) {
        let Some(provider) = &self.market_data else {
            return;
        };

        let lookups = picks
            .iter()
            .enumerate()
            .filter(|(_, pick)| pick.current_price <= 0.0)
            .map(|(i, pick)| {
                let provider = Arc::clone(provider);
                let ticker = pick.ticker.clone();
                async move { (i, ticker.clone(), provider.current_price(&ticker).await) }
            });

        for (i, ticker, price) in join_all(lookups).await {
            match price {
                Ok(price) => picks[i].current_price = price,
                Err(e) => warn!(%ticker, error = %e, "Current price unavailable"),
            }
        }
    }
}

/// Builder for ResearchEngine
#[derive(Default)]
pub struct ResearchEngineBuilder {
    config: Option<ResearchConfig>,
    catalog: Option<Arc<Catalog>>,
    tradability: Option<Arc<dyn TradabilityFilter>>,
    analyzers: Vec<Arc<dyn Analyzer>>,
    market_data: Option<Arc<dyn MarketDataProvider>>,
    store: Option<Arc<dyn ReportStore>>,
}

impl ResearchEngineBuilder {
    pub fn config(mut self, config: ResearchConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(Arc::new(catalog));
        self
    }

    /// Defaults to the brokerage filter over the catalog
    pub fn tradability(mut self, filter: Arc<dyn TradabilityFilter>) -> Self {
        self.tradability = Some(filter);
        self
    }

    /// Add an analyzer; replaces the defaults derived from market data
    pub fn analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzers.push(analyzer);
        self
    }

    /// Provider for the default analyzers and for price lookups
    pub fn market_data(mut self, provider: Arc<dyn MarketDataProvider>) -> Self {
        self.market_data = Some(provider);
        self
    }

    pub fn store(mut self, store: Arc<dyn ReportStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<ResearchEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let analyzers = match (self.analyzers.is_empty(), &self.market_data) {
            (false, _) => self.analyzers,
            (true, Some(provider)) => default_analyzers(Arc::clone(provider), &config),
            (true, None) => {
                return Err(ResearchError::Config(
                    "no analyzers configured and no market data provider".to_string(),
                ));
            }
        };

        let catalog = self.catalog.unwrap_or_default();
        let tradability = self.tradability.unwrap_or_else(|| {
            Arc::new(BrokerageTradability::new(Arc::clone(&catalog))) as Arc<dyn TradabilityFilter>
        });

        Ok(ResearchEngine {
            universe: UniverseBuilder::new(catalog, tradability, config.max_universe),
            coordinator: AnalysisCoordinator::new(analyzers, &config),
            aggregator: SignalAggregator::new(
                config.weights.clone(),
                config.risk_tolerance.clone(),
                config.confidence_floor,
            ),
            sizer: AllocationSizer::new(&config),
            compiler: ReportCompiler,
            market_data: self.market_data,
            store: self.store,
            config: Arc::new(config),
        })
    }
}
