//! Candidate universe construction

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{ResearchError, Result};
use crate::model::{AssetClass, CandidateAsset, ResearchRequest};

const BROKERAGE_STOCKS: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA", "BRK-B", "UNH", "JNJ", "V", "XOM",
    "JPM", "MA", "PG", "HD", "CVX", "MRK", "ABBV", "LLY", "PEP", "KO", "COST", "AVGO", "TMO",
    "MCD", "WMT", "CSCO", "ACN", "ABT", "DHR", "NEE", "VZ", "ADBE", "NKE", "TXN", "PM", "CMCSA",
    "INTC", "AMD", "QCOM", "UPS", "HON", "LOW", "COP",
];

const BROKERAGE_ETFS: &[&str] = &[
    "SPY", "QQQ", "IWM", "DIA", "VTI", "VOO", "VEA", "VWO", "BND", "GLD", "SLV", "USO",
];

const BROKERAGE_CRYPTO: &[&str] = &[
    "BTC-USD", "ETH-USD", "DOGE-USD", "SOL-USD", "LTC-USD", "AVAX-USD", "LINK-USD", "SHIB-USD",
    "XLM-USD", "ETC-USD",
];

/// Decides whether a ticker can be traded on the target brokerage
pub trait TradabilityFilter: Send + Sync {
    fn is_tradable(&self, ticker: &str) -> bool;
}

/// Tickers listed per asset class, in listing order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    listings: BTreeMap<AssetClass, Vec<String>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::brokerage()
    }
}

impl Catalog {
    /// An empty catalog
    pub fn new() -> Self {
        Self {
            listings: BTreeMap::new(),
        }
    }

    /// Large-cap stocks, major ETFs and crypto pairs offered by the brokerage
    pub fn brokerage() -> Self {
        Self::new()
            .with_listing(AssetClass::Stocks, BROKERAGE_STOCKS.iter().copied())
            .with_listing(AssetClass::Etfs, BROKERAGE_ETFS.iter().copied())
            .with_listing(AssetClass::Crypto, BROKERAGE_CRYPTO.iter().copied())
    }

    /// Append tickers to a class listing; duplicates are ignored
    pub fn with_listing<I, S>(mut self, class: AssetClass, tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let listing = self.listings.entry(class).or_default();
        for ticker in tickers {
            if let Some(ticker) = normalize(ticker.as_ref()) {
                if !listing.contains(&ticker) {
                    listing.push(ticker);
                }
            }
        }
        self
    }

    pub fn tickers(&self, class: AssetClass) -> &[String] {
        self.listings.get(&class).map(Vec::as_slice).unwrap_or_default()
    }

    /// Class a ticker is listed under
    pub fn class_of(&self, ticker: &str) -> Option<AssetClass> {
        self.listings
            .iter()
            .find(|(_, tickers)| tickers.iter().any(|t| t == ticker))
            .map(|(class, _)| *class)
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.class_of(ticker).is_some()
    }
}

/// Tradability backed by the catalog listings
#[derive(Debug, Clone, Default)]
pub struct BrokerageTradability {
    catalog: Arc<Catalog>,
}

impl BrokerageTradability {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

impl TradabilityFilter for BrokerageTradability {
    fn is_tradable(&self, ticker: &str) -> bool {
        self.catalog.contains(ticker)
    }
}

/// Candidates for one request
#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub candidates: Vec<CandidateAsset>,
    /// Explicit tickers the tradability filter rejected
    pub rejected: Vec<String>,
}

/// Expands a request into its tradable candidates
pub struct UniverseBuilder {
    catalog: Arc<Catalog>,
    filter: Arc<dyn TradabilityFilter>,
    max_universe: usize,
}

impl UniverseBuilder {
    pub fn new(
        catalog: Arc<Catalog>,
        filter: Arc<dyn TradabilityFilter>,
        max_universe: usize,
    ) -> Self {
        Self {
            catalog,
            filter,
            max_universe,
        }
    }

    /// Build the candidate list.
    ///
    /// Explicit tickers replace class expansion and are not truncated.
    pub fn build(&self, request: &ResearchRequest) -> Result<Universe> {
        let universe = match request.tickers() {
            Some(tickers) => self.from_tickers(tickers),
            None => self.from_classes(request.asset_classes()),
        };

        if universe.candidates.is_empty() {
            return Err(ResearchError::EmptyUniverse {
                asset_classes: request.asset_classes().to_vec(),
                rejected_tickers: universe.rejected,
            });
        }

        info!(
            candidates = universe.candidates.len(),
            rejected = universe.rejected.len(),
            "Universe built"
        );
        Ok(universe)
    }

    fn from_tickers(&self, tickers: &[String]) -> Universe {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut rejected = Vec::new();

        for ticker in tickers.iter().filter_map(|t| normalize(t)) {
            if !seen.insert(ticker.clone()) {
                continue;
            }
            if !self.filter.is_tradable(&ticker) {
                debug!(%ticker, "Rejected by tradability filter");
                rejected.push(ticker);
                continue;
            }
            let class = self
                .catalog
                .class_of(&ticker)
                .unwrap_or_else(|| infer_class(&ticker));
            candidates.push(CandidateAsset::new(ticker, class));
        }

        Universe {
            candidates,
            rejected,
        }
    }

    fn from_classes(&self, classes: &[AssetClass]) -> Universe {
        let mut seen = HashSet::new();
        let candidates = classes
            .iter()
            .flat_map(|class| {
                self.catalog
                    .tickers(*class)
                    .iter()
                    .map(move |ticker| (ticker, *class))
            })
            .filter(|(ticker, _)| seen.insert(*ticker))
            .filter(|(ticker, _)| self.filter.is_tradable(ticker))
            .take(self.max_universe)
            .map(|(ticker, class)| CandidateAsset::new(ticker.clone(), class))
            .collect();

        Universe {
            candidates,
            rejected: Vec::new(),
        }
    }
}

fn normalize(ticker: &str) -> Option<String> {
    let ticker = ticker.trim();
    (!ticker.is_empty()).then(|| ticker.to_ascii_uppercase())
}

fn infer_class(ticker: &str) -> AssetClass {
    if ticker.ends_with("-USD") {
        AssetClass::Crypto
    } else {
        AssetClass::Stocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RiskPreference;
    use rust_decimal_macros::dec;

    struct AllowAll;

    impl TradabilityFilter for AllowAll {
        fn is_tradable(&self, _ticker: &str) -> bool {
            true
        }
    }

    fn builder(max_universe: usize) -> UniverseBuilder {
        let catalog = Arc::new(Catalog::brokerage());
        let filter = Arc::new(BrokerageTradability::new(Arc::clone(&catalog)));
        UniverseBuilder::new(catalog, filter, max_universe)
    }

    fn request(classes: &[AssetClass], tickers: Option<&[&str]>) -> ResearchRequest {
        ResearchRequest::new(
            classes.iter().copied(),
            dec!(1000),
            RiskPreference::Moderate,
            tickers.map(|t| t.iter().map(ToString::to_string).collect()),
        )
        .unwrap()
    }

    #[test]
    fn test_brokerage_catalog() {
        let catalog = Catalog::brokerage();
        assert_eq!(catalog.tickers(AssetClass::Stocks).len(), 45);
        assert_eq!(catalog.tickers(AssetClass::Etfs).len(), 12);
        assert_eq!(catalog.class_of("BTC-USD"), Some(AssetClass::Crypto));
        assert!(catalog.tickers(AssetClass::Bonds).is_empty());
    }

    #[test]
    fn test_class_expansion_truncates() {
        let universe = builder(50)
            .build(&request(&[AssetClass::Stocks, AssetClass::Etfs], None))
            .unwrap();
        assert_eq!(universe.candidates.len(), 50);
        assert_eq!(universe.candidates[0].ticker, "AAPL");
        assert_eq!(universe.candidates[45].asset_class, AssetClass::Etfs);
    }

    #[test]
    fn test_explicit_tickers_bypass_class_filter() {
        let universe = builder(50)
            .build(&request(
                &[AssetClass::Stocks],
                Some(&[" spy ", "eth-usd", "SPY", "ZZZZ"]),
            ))
            .unwrap();

        let tickers: Vec<_> = universe.candidates.iter().map(|c| c.ticker.as_str()).collect();
        assert_eq!(tickers, ["SPY", "ETH-USD"]);
        assert_eq!(universe.candidates[0].asset_class, AssetClass::Etfs);
        assert_eq!(universe.rejected, ["ZZZZ"]);
    }

    #[test]
    fn test_unlisted_ticker_class_is_inferred() {
        let catalog = Arc::new(Catalog::new());
        let builder = UniverseBuilder::new(catalog, Arc::new(AllowAll), 50);
        let universe = builder
            .build(&request(&[AssetClass::Stocks], Some(&["NEW-USD", "ACME"])))
            .unwrap();
        assert_eq!(universe.candidates[0].asset_class, AssetClass::Crypto);
        assert_eq!(universe.candidates[1].asset_class, AssetClass::Stocks);
    }

    #[test]
    fn test_empty_universe() {
        let err = builder(50)
            .build(&request(&[AssetClass::Bonds], None))
            .unwrap_err();
        assert!(matches!(err, ResearchError::EmptyUniverse { .. }));

        let err = builder(50)
            .build(&request(&[AssetClass::Stocks], Some(&["NOPE"])))
            .unwrap_err();
        assert_eq!(err.affected_tickers(), ["NOPE"]);
    }
}
