//! Budget allocation across ranked picks

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::aggregator::ScoredCandidate;
use crate::config::{ResearchConfig, RiskBands};
use crate::error::{InfeasibleReason, ResearchError, Result};
use crate::model::{AnalysisSignal, AnalyzerKind, Pick, RiskLevel, metrics};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Sizes positions from conviction under a per-pick cap
#[derive(Debug, Clone)]
pub struct AllocationSizer {
    max_fraction: Decimal,
    scale: u32,
    bands: RiskBands,
}

impl AllocationSizer {
    pub fn new(config: &ResearchConfig) -> Self {
        Self {
            max_fraction: config.max_allocation_fraction,
            scale: config.currency_scale,
            bands: config.risk_bands,
        }
    }

    /// Fail early on a budget no allocation can satisfy
    pub fn check_budget(&self, budget: Decimal) -> Result<()> {
        if budget <= Decimal::ZERO {
            return Err(ResearchError::AllocationInfeasible {
                reason: InfeasibleReason::NonPositiveBudget,
                tickers: Vec::new(),
            });
        }
        if budget.normalize().scale() > self.scale {
            return Err(ResearchError::InvalidRequest(format!(
                "budget {budget} has more than {} decimal places",
                self.scale
            )));
        }
        Ok(())
    }

    /// Build picks for `ranked`, which must already be in rank order
    pub fn size(&self, ranked: &[ScoredCandidate], budget: Decimal) -> Result<Vec<Pick>> {
        self.check_budget(budget)?;
        let budget = budget.round_dp(self.scale);
        if ranked.is_empty() {
            return Err(ResearchError::AllocationInfeasible {
                reason: InfeasibleReason::NoPicks,
                tickers: Vec::new(),
            });
        }

        let tickers = || -> Vec<String> {
            ranked.iter().map(|s| s.score.ticker.clone()).collect()
        };
        let cap = self.floor(budget * self.max_fraction);
        let Some(capacity) = cap.checked_mul(Decimal::from(ranked.len())) else {
            return Err(ResearchError::AllocationInfeasible {
                reason: InfeasibleReason::BudgetOutOfRange,
                tickers: tickers(),
            });
        };
        if capacity < budget {
            return Err(ResearchError::AllocationInfeasible {
                reason: InfeasibleReason::CapsBelowBudget,
                tickers: tickers(),
            });
        }

        let raw: Vec<Decimal> = ranked
            .iter()
            .map(|s| to_decimal(s.score.conviction().max(0.0)))
            .collect();
        let shares = water_fill(&raw, self.max_fraction);
        let amounts = self.amounts(&shares, budget, cap);

        Ok(ranked
            .iter()
            .zip(amounts)
            .enumerate()
            .map(|(i, (scored, amount))| {
                let technical = technical_signal(&scored.signals);
                Pick {
                    rank: i + 1,
                    ticker: scored.candidate.ticker.clone(),
                    asset_class: scored.candidate.asset_class,
                    current_price: current_price(&scored.signals),
                    expected_yield: technical.map_or(0.0, expected_yield),
                    strength: scored.score.strength,
                    confidence: scored.score.confidence,
                    risk_level: self.risk_level(scored, technical),
                    allocation_percent: (amount / budget * HUNDRED).round_dp(2),
                    allocation_amount: amount,
                    rationale: rationale(scored),
                }
            })
            .collect())
    }

    fn floor(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.scale, RoundingStrategy::ToZero)
    }

    /// Currency amounts summing exactly to `budget`.
    ///
    /// All but the last pick round toward zero; the last takes the remainder
    /// and any part of it above the cap moves to the lowest-ranked pick with
    /// headroom.
    fn amounts(&self, shares: &[Decimal], budget: Decimal, cap: Decimal) -> Vec<Decimal> {
        let last = shares.len() - 1;
        let mut amounts: Vec<Decimal> = shares
            .iter()
            .take(last)
            .map(|share| self.floor(budget * share).min(cap))
            .collect();
        let allocated: Decimal = amounts.iter().sum();
        amounts.push(budget - allocated);

        let mut overflow = amounts[last] - cap;
        if overflow > Decimal::ZERO {
            amounts[last] = cap;
            for amount in amounts.iter_mut().take(last).rev() {
                let moved = (cap - *amount).min(overflow);
                if moved > Decimal::ZERO {
                    *amount += moved;
                    overflow -= moved;
                }
                if overflow <= Decimal::ZERO {
                    break;
                }
            }
            debug!(%overflow, "Moved remainder overflow to picks with headroom");
        }
        amounts
    }

    fn risk_level(&self, scored: &ScoredCandidate, technical: Option<&AnalysisSignal>) -> RiskLevel {
        let bands = &self.bands;
        match technical.and_then(|s| s.metric(metrics::VOLATILITY)) {
            Some(vol) if vol < bands.low_volatility => RiskLevel::Low,
            Some(vol) if vol < bands.high_volatility => RiskLevel::Medium,
            Some(_) => RiskLevel::High,
            None => {
                let conviction = scored.score.conviction().abs();
                if conviction >= bands.low_risk_conviction {
                    RiskLevel::Low
                } else if conviction < bands.high_risk_conviction {
                    RiskLevel::High
                } else {
                    RiskLevel::Medium
                }
            }
        }
    }
}

/// Split 1.0 across `raw` weights with no share above `cap`.
///
/// Shares are proportional to raw weight among unclamped picks; once a pick
/// hits the cap the rest is renormalized over the others. Free picks whose
/// raw weights are all zero split what remains equally.
pub fn water_fill(raw: &[Decimal], cap: Decimal) -> Vec<Decimal> {
    let mut fixed: Vec<Option<Decimal>> = vec![None; raw.len()];

    loop {
        let remaining = Decimal::ONE - fixed.iter().flatten().sum::<Decimal>();
        let free: Vec<usize> = (0..raw.len()).filter(|&i| fixed[i].is_none()).collect();
        if free.is_empty() {
            break;
        }

        let free_raw: Decimal = free.iter().map(|&i| raw[i]).sum();
        let tentative = |i: usize| {
            if free_raw > Decimal::ZERO {
                remaining * raw[i] / free_raw
            } else {
                remaining / Decimal::from(free.len())
            }
        };

        let over: Vec<usize> = free.iter().copied().filter(|&i| tentative(i) > cap).collect();
        if over.is_empty() {
            for &i in &free {
                fixed[i] = Some(tentative(i));
            }
            break;
        }
        for i in over {
            fixed[i] = Some(cap);
        }
    }

    fixed.into_iter().map(Option::unwrap_or_default).collect()
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::try_from(value)
        .map(|d| d.round_dp(10))
        .unwrap_or_default()
}

fn technical_signal(signals: &[AnalysisSignal]) -> Option<&AnalysisSignal> {
    signals
        .iter()
        .find(|s| s.kind == AnalyzerKind::Technical && s.is_success())
}

fn current_price(signals: &[AnalysisSignal]) -> f64 {
    let priced = |kind: AnalyzerKind| {
        signals
            .iter()
            .filter(|s| s.kind == kind)
            .find_map(|s| s.metric(metrics::CURRENT_PRICE))
    };
    AnalyzerKind::ALL
        .iter()
        .rev()
        .find_map(|kind| priced(*kind))
        .unwrap_or(0.0)
}

/// One year yield estimate from historical return and consensus
fn expected_yield(technical: &AnalysisSignal) -> f64 {
    let Some(ret) = technical.metric(metrics::HISTORICAL_RETURN) else {
        return 0.0;
    };
    let direction = technical.metric(metrics::CONSENSUS_DIRECTION).unwrap_or(0.0);
    let strength = technical.metric(metrics::CONSENSUS_STRENGTH).unwrap_or(0.0);

    let estimate = if direction > 0.0 {
        ret * (1.0 + strength * 0.5)
    } else if direction < 0.0 {
        ret * 0.5
    } else {
        ret * 0.8
    };
    estimate.clamp(-0.5, 1.0)
}

fn rationale(scored: &ScoredCandidate) -> String {
    let mut lines: Vec<String> = scored
        .signals
        .iter()
        .filter(|s| s.is_success())
        .map(|s| format!("{}: {}", s.kind, s.rationale))
        .collect();
    if let Some(risk) = &scored.risk {
        lines.push(format!("Risk: {}", risk.summary()));
    }
    lines.join("\n")
}
