//! Return statistics

use serde::{Deserialize, Serialize};

/// Trading days per year used for annualization
pub const TRADING_DAYS: f64 = 252.0;

/// Annual risk-free rate subtracted in the Sharpe ratio
pub const RISK_FREE_RATE: f64 = 0.05;

/// Summary of a close series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnStats {
    /// First to last close
    pub total_return: f64,
    pub mean_daily_return: f64,
    /// Annualized standard deviation of daily returns
    pub volatility: f64,
    /// Most negative peak-to-trough move, zero or below
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
}

impl ReturnStats {
    /// Statistics for `closes`, oldest first. `None` with fewer than two
    /// closes or a non-positive close.
    pub fn from_closes(closes: &[f64]) -> Option<Self> {
        if closes.len() < 2 || closes.iter().any(|c| !c.is_finite() || *c <= 0.0) {
            return None;
        }

        let first = closes[0];
        let last = closes[closes.len() - 1];

        let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
        let mean = mean(&returns);
        let std = std_dev(&returns);

        Some(Self {
            total_return: (last - first) / first,
            mean_daily_return: mean,
            volatility: std * TRADING_DAYS.sqrt(),
            max_drawdown: max_drawdown(closes),
            sharpe_ratio: sharpe(&returns),
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn max_drawdown(closes: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for &close in closes {
        peak = peak.max(close);
        worst = worst.min((close - peak) / peak);
    }
    worst
}

fn sharpe(returns: &[f64]) -> f64 {
    let std = std_dev(returns);
    if std == 0.0 {
        return 0.0;
    }
    let daily_rf = RISK_FREE_RATE / TRADING_DAYS;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    mean(&excess) / std_dev(&excess) * TRADING_DAYS.sqrt()
}
