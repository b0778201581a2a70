//! Ordering and selection of scored candidates

use std::cmp::Ordering;

use crate::aggregator::ScoredCandidate;

/// Strength descending, then confidence descending, then ticker ascending
pub fn compare(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .strength
        .total_cmp(&a.score.strength)
        .then_with(|| b.score.confidence.total_cmp(&a.score.confidence))
        .then_with(|| a.score.ticker.cmp(&b.score.ticker))
}

/// Sort and keep the top `max_picks`
pub fn rank(mut scored: Vec<ScoredCandidate>, max_picks: usize) -> Vec<ScoredCandidate> {
    scored.sort_by(compare);
    scored.truncate(max_picks);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetClass, CandidateAsset, CompositeScore};

    fn scored(ticker: &str, strength: f64, confidence: f64) -> ScoredCandidate {
        ScoredCandidate {
            candidate: CandidateAsset::new(ticker, AssetClass::Stocks),
            score: CompositeScore::new(ticker, strength, confidence, 3),
            signals: Vec::new(),
            risk: None,
        }
    }

    fn tickers(ranked: &[ScoredCandidate]) -> Vec<&str> {
        ranked.iter().map(|s| s.score.ticker.as_str()).collect()
    }

    #[test]
    fn test_ordering_and_tie_breaks() {
        let ranked = rank(
            vec![
                scored("CCC", 0.5, 0.7),
                scored("BBB", 0.5, 0.9),
                scored("AAA", 0.5, 0.7),
                scored("DDD", 0.9, 0.3),
                scored("EEE", -0.2, 0.9),
            ],
            10,
        );
        assert_eq!(tickers(&ranked), ["DDD", "BBB", "AAA", "CCC", "EEE"]);
    }

    #[test]
    fn test_truncates_without_padding() {
        let many: Vec<_> = (0..15)
            .map(|i| scored(&format!("T{i:02}"), f64::from(i) / 20.0, 0.5))
            .collect();
        let ranked = rank(many, 10);
        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].score.ticker, "T14");

        let few = rank(vec![scored("ONE", 0.1, 0.5)], 10);
        assert_eq!(few.len(), 1);
    }
}
