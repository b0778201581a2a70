//! Concurrent fan-out of analyzers over candidates

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

use crate::agents::Analyzer;
use crate::config::ResearchConfig;
use crate::error::AnalyzerError;
use crate::model::{AnalysisSignal, CandidateAsset, DropReason, DroppedCandidate};

const ABANDONED: &str = "abandoned at request deadline";
const LOST: &str = "analyzer task did not complete";

/// Signals gathered for one candidate, in analyzer order
#[derive(Debug, Clone)]
pub struct CandidateAnalysis {
    pub candidate: CandidateAsset,
    pub signals: Vec<AnalysisSignal>,
}

impl CandidateAnalysis {
    pub fn successes(&self) -> impl Iterator<Item = &AnalysisSignal> {
        self.signals.iter().filter(|s| s.is_success())
    }
}

/// Result of the analysis stage
#[derive(Debug, Clone, Default)]
pub struct AnalysisOutcome {
    /// Candidates with at least one successful signal, in universe order
    pub analyzed: Vec<CandidateAnalysis>,
    /// Candidates where every analyzer failed
    pub dropped: Vec<DroppedCandidate>,
    /// Whether the request deadline cut the stage short
    pub deadline_exceeded: bool,
}

/// Runs every analyzer against every candidate on a bounded pool
pub struct AnalysisCoordinator {
    analyzers: Vec<Arc<dyn Analyzer>>,
    pool_size: usize,
    call_timeout: Duration,
    deadline: Duration,
}

impl AnalysisCoordinator {
    pub fn new(analyzers: Vec<Arc<dyn Analyzer>>, config: &ResearchConfig) -> Self {
        Self {
            analyzers,
            pool_size: config.pool_size.max(1),
            call_timeout: config.analyzer_timeout,
            deadline: config.request_deadline,
        }
    }

    pub fn analyzers(&self) -> &[Arc<dyn Analyzer>] {
        &self.analyzers
    }

    /// Analyze all candidates.
    ///
    /// Never fails: timeouts and analyzer errors become failed signals, and
    /// calls still outstanding at the deadline are abandoned.
    pub async fn run(&self, candidates: &[CandidateAsset]) -> AnalysisOutcome {
        let deadline = Instant::now() + self.deadline;
        let semaphore = Arc::new(Semaphore::new(self.pool_size));
        let mut slots: Vec<Vec<Option<AnalysisSignal>>> =
            vec![vec![None; self.analyzers.len()]; candidates.len()];

        info!(
            candidates = candidates.len(),
            analyzers = self.analyzers.len(),
            pool_size = self.pool_size,
            "Starting analysis"
        );

        let mut tasks = JoinSet::new();
        for (ci, candidate) in candidates.iter().enumerate() {
            for (ai, analyzer) in self.analyzers.iter().enumerate() {
                let analyzer = Arc::clone(analyzer);
                let candidate = candidate.clone();
                let semaphore = Arc::clone(&semaphore);
                let call_timeout = self.call_timeout;

                tasks.spawn(async move {
                    let signal = call(analyzer.as_ref(), &candidate, &semaphore, call_timeout).await;
                    (ci, ai, signal)
                });
            }
        }

        let mut deadline_exceeded = false;
        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((ci, ai, signal)))) => slots[ci][ai] = Some(signal),
                Ok(Some(Err(e))) => warn!(error = %e, "Analyzer task aborted"),
                Ok(None) => break,
                Err(_) => {
                    deadline_exceeded = true;
                    warn!(
                        outstanding = tasks.len(),
                        deadline = ?self.deadline,
                        "Request deadline reached, abandoning outstanding analyzer calls"
                    );
                    tasks.abort_all();
                    while let Some(joined) = tasks.join_next().await {
                        if let Ok((ci, ai, signal)) = joined {
                            slots[ci][ai] = Some(signal);
                        }
                    }
                    break;
                }
            }
        }

        let unfinished = if deadline_exceeded { ABANDONED } else { LOST };
        let mut outcome = AnalysisOutcome {
            deadline_exceeded,
            ..AnalysisOutcome::default()
        };

        for (candidate, row) in candidates.iter().zip(slots) {
            let signals: Vec<AnalysisSignal> = row
                .into_iter()
                .zip(&self.analyzers)
                .map(|(slot, analyzer)| {
                    slot.unwrap_or_else(|| AnalysisSignal::failed(analyzer.kind(), unfinished))
                })
                .collect();

            for signal in signals.iter().filter(|s| !s.is_success()) {
                warn!(
                    ticker = %candidate.ticker,
                    analyzer = %signal.kind,
                    reason = signal.failure_reason().unwrap_or_default(),
                    "Analyzer failed"
                );
            }

            if signals.iter().any(AnalysisSignal::is_success) {
                outcome.analyzed.push(CandidateAnalysis {
                    candidate: candidate.clone(),
                    signals,
                });
            } else {
                warn!(ticker = %candidate.ticker, "No analyzer succeeded, dropping candidate");
                let failures = signals
                    .iter()
                    .map(|s| (s.kind, s.failure_reason().unwrap_or_default().to_string()))
                    .collect();
                outcome.dropped.push(DroppedCandidate::new(
                    candidate.ticker.clone(),
                    DropReason::NoSuccessfulAnalyzers { failures },
                ));
            }
        }

        info!(
            analyzed = outcome.analyzed.len(),
            dropped = outcome.dropped.len(),
            deadline_exceeded,
            "Analysis complete"
        );
        outcome
    }
}

/// One analyzer call; the timeout starts once a pool permit is held
async fn call(
    analyzer: &dyn Analyzer,
    candidate: &CandidateAsset,
    semaphore: &Semaphore,
    call_timeout: Duration,
) -> AnalysisSignal {
    let kind = analyzer.kind();
    let Ok(_permit) = semaphore.acquire().await else {
        return AnalysisSignal::failed(kind, "worker pool closed");
    };

    debug!(ticker = %candidate.ticker, analyzer = %kind, "Running analyzer");
    match timeout(call_timeout, analyzer.analyze(candidate)).await {
        Ok(Ok(mut signal)) => {
            signal.kind = kind;
            signal
        }
        Ok(Err(e)) => AnalysisSignal::failed(kind, e.to_string()),
        Err(_) => AnalysisSignal::failed(kind, AnalyzerError::Timeout(call_timeout).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::MockAnalyzer;
    use crate::model::{AnalyzerKind, AssetClass};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Sleepy {
        kind: AnalyzerKind,
        delay: Duration,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Analyzer for Sleepy {
        fn kind(&self) -> AnalyzerKind {
            self.kind
        }

        async fn analyze(
            &self,
            _candidate: &CandidateAsset,
        ) -> Result<AnalysisSignal, AnalyzerError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(AnalysisSignal::new(self.kind, 0.5, 0.5, "slept"))
        }
    }

    fn config(pool: usize, call: Duration, deadline: Duration) -> ResearchConfig {
        ResearchConfig::builder()
            .pool_size(pool)
            .analyzer_timeout(call)
            .request_deadline(deadline)
            .build()
            .unwrap()
    }

    fn candidates(tickers: &[&str]) -> Vec<CandidateAsset> {
        tickers
            .iter()
            .map(|t| CandidateAsset::new(*t, AssetClass::Stocks))
            .collect()
    }

    fn succeeding(kind: AnalyzerKind) -> Arc<dyn Analyzer> {
        let mut mock = MockAnalyzer::new();
        mock.expect_kind().return_const(kind);
        mock.expect_analyze()
            .returning(move |c| Ok(AnalysisSignal::new(kind, 0.4, 0.8, format!("ok {}", c.ticker))));
        Arc::new(mock)
    }

    fn failing(kind: AnalyzerKind) -> Arc<dyn Analyzer> {
        let mut mock = MockAnalyzer::new();
        mock.expect_kind().return_const(kind);
        mock.expect_analyze().returning(|c| {
            Err(AnalyzerError::InsufficientData {
                ticker: c.ticker.clone(),
                reason: "no data".to_string(),
            })
        });
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_candidate() {
        let coordinator = AnalysisCoordinator::new(
            vec![
                succeeding(AnalyzerKind::Fundamental),
                failing(AnalyzerKind::Technical),
            ],
            &ResearchConfig::default(),
        );

        let outcome = coordinator.run(&candidates(&["AAA", "BBB"])).await;
        assert_eq!(outcome.analyzed.len(), 2);
        assert!(outcome.dropped.is_empty());

        let first = &outcome.analyzed[0];
        assert_eq!(first.candidate.ticker, "AAA");
        assert_eq!(first.signals.len(), 2);
        assert_eq!(first.successes().count(), 1);
        assert_eq!(first.signals[1].kind, AnalyzerKind::Technical);
        assert!(!first.signals[1].is_success());
    }

    #[tokio::test]
    async fn test_all_failures_drop_candidate() {
        let coordinator = AnalysisCoordinator::new(
            vec![
                failing(AnalyzerKind::Fundamental),
                failing(AnalyzerKind::Sentiment),
            ],
            &ResearchConfig::default(),
        );

        let outcome = coordinator.run(&candidates(&["XYZ"])).await;
        assert!(outcome.analyzed.is_empty());
        assert_eq!(outcome.dropped.len(), 1);
        match &outcome.dropped[0].reason {
            DropReason::NoSuccessfulAnalyzers { failures } => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].0, AnalyzerKind::Fundamental);
                assert!(failures[0].1.contains("no data"));
            }
            other => panic!("unexpected reason: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let slow: Arc<dyn Analyzer> = Arc::new(Sleepy {
            kind: AnalyzerKind::Sentiment,
            delay: Duration::from_secs(5),
            in_flight: Arc::default(),
            peak: Arc::default(),
        });
        let coordinator = AnalysisCoordinator::new(
            vec![succeeding(AnalyzerKind::Technical), slow],
            &config(4, Duration::from_millis(50), Duration::from_secs(10)),
        );

        let outcome = coordinator.run(&candidates(&["AAA"])).await;
        assert!(!outcome.deadline_exceeded);
        let signals = &outcome.analyzed[0].signals;
        assert!(signals[0].is_success());
        assert!(signals[1].failure_reason().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        let peak = Arc::new(AtomicUsize::new(0));
        let sleepy: Arc<dyn Analyzer> = Arc::new(Sleepy {
            kind: AnalyzerKind::Technical,
            delay: Duration::from_millis(20),
            in_flight: Arc::default(),
            peak: Arc::clone(&peak),
        });
        let coordinator = AnalysisCoordinator::new(
            vec![sleepy],
            &config(2, Duration::from_secs(1), Duration::from_secs(10)),
        );

        let outcome = coordinator
            .run(&candidates(&["A", "B", "C", "D", "E", "F"]))
            .await;
        assert_eq!(outcome.analyzed.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_deadline_abandons_outstanding_calls() {
        let slow: Arc<dyn Analyzer> = Arc::new(Sleepy {
            kind: AnalyzerKind::Fundamental,
            delay: Duration::from_secs(30),
            in_flight: Arc::default(),
            peak: Arc::default(),
        });
        let coordinator = AnalysisCoordinator::new(
            vec![slow, succeeding(AnalyzerKind::Technical)],
            &config(8, Duration::from_secs(60), Duration::from_millis(100)),
        );

        let outcome = coordinator.run(&candidates(&["AAA"])).await;
        assert!(outcome.deadline_exceeded);
        let signals = &outcome.analyzed[0].signals;
        assert_eq!(signals[0].failure_reason(), Some(ABANDONED));
        assert!(signals[1].is_success());
    }
}
