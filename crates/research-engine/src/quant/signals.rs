//! Rule-based indicator signals and their consensus

use std::fmt;

use serde::{Deserialize, Serialize};
use ta::Next;
use ta::indicators::{
    BollingerBands, MovingAverageConvergenceDivergence, RelativeStrengthIndex,
    SimpleMovingAverage,
};

use crate::error::AnalyzerError;

/// Closes needed for the slowest indicator plus one prior bar
pub const MIN_CLOSES: usize = SMA_LONG + 1;

const SMA_SHORT: usize = 20;
const SMA_LONG: usize = 50;
const RSI_PERIOD: usize = 14;
const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;
const BOLLINGER_PERIOD: usize = 20;
const BOLLINGER_WIDTH: f64 = 2.0;
const MOMENTUM_LOOKBACK: usize = 252;
const MOMENTUM_SHORT: usize = 20;
const CONSENSUS_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    /// +1 buy, -1 sell, 0 hold
    pub const fn direction(self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
            Self::Hold => 0.0,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
            Self::Hold => write!(f, "hold"),
        }
    }
}

/// Output of one indicator rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantSignal {
    pub action: Action,
    /// In [0, 1]
    pub strength: f64,
    pub reason: String,
}

impl QuantSignal {
    fn new(action: Action, strength: f64, reason: impl Into<String>) -> Self {
        let strength = if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            action,
            strength,
            reason: reason.into(),
        }
    }

    fn hold(strength: f64, reason: impl Into<String>) -> Self {
        Self::new(Action::Hold, strength, reason)
    }
}

fn indicator_error(e: impl fmt::Display) -> AnalyzerError {
    AnalyzerError::Indicator(e.to_string())
}

fn run<I, O>(mut indicator: I, closes: &[f64]) -> Vec<O>
where
    I: Next<f64, Output = O>,
{
    closes.iter().map(|&c| indicator.next(c)).collect()
}

fn last_two<T: Clone>(values: &[T]) -> Result<(T, T), AnalyzerError> {
    match values {
        [.., prev, current] => Ok((prev.clone(), current.clone())),
        _ => Err(AnalyzerError::Indicator(
            "at least two values are required".to_string(),
        )),
    }
}

/// Moving average crossover of the 20 and 50 day SMAs
pub fn sma_crossover(closes: &[f64]) -> Result<QuantSignal, AnalyzerError> {
    let short = run(SimpleMovingAverage::new(SMA_SHORT).map_err(indicator_error)?, closes);
    let long = run(SimpleMovingAverage::new(SMA_LONG).map_err(indicator_error)?, closes);
    let (prev_short, current_short) = last_two(&short)?;
    let (prev_long, current_long) = last_two(&long)?;

    let signal = if current_short > current_long && prev_short <= prev_long {
        QuantSignal::new(
            Action::Buy,
            (current_short - current_long) / current_long * 10.0,
            format!("SMA{SMA_SHORT} crossed above SMA{SMA_LONG}"),
        )
    } else if current_short < current_long && prev_short >= prev_long {
        QuantSignal::new(
            Action::Sell,
            (current_long - current_short) / current_long * 10.0,
            format!("SMA{SMA_SHORT} crossed below SMA{SMA_LONG}"),
        )
    } else if current_short > current_long {
        QuantSignal::hold(0.5, format!("Uptrend: SMA{SMA_SHORT} above SMA{SMA_LONG}"))
    } else {
        QuantSignal::hold(0.5, format!("Downtrend: SMA{SMA_SHORT} below SMA{SMA_LONG}"))
    };
    Ok(signal)
}

/// MACD 12/26/9 line and histogram
pub fn macd(closes: &[f64]) -> Result<QuantSignal, AnalyzerError> {
    let indicator = MovingAverageConvergenceDivergence::new(12, 26, 9).map_err(indicator_error)?;
    let outputs = run(indicator, closes);
    let (prev, current) = last_two(&outputs)?;
    let price = closes.last().copied().unwrap_or(1.0);

    let signal = if current.macd > current.signal && prev.macd <= prev.signal {
        QuantSignal::new(
            Action::Buy,
            current.histogram.abs() / price * 100.0,
            "MACD crossed above signal line",
        )
    } else if current.macd < current.signal && prev.macd >= prev.signal {
        QuantSignal::new(
            Action::Sell,
            current.histogram.abs() / price * 100.0,
            "MACD crossed below signal line",
        )
    } else if current.histogram > 0.0 && current.histogram > prev.histogram {
        QuantSignal::hold(0.6, "Bullish momentum increasing")
    } else {
        QuantSignal::hold(0.4, "Bearish momentum or consolidation")
    };
    Ok(signal)
}

/// 14 day RSI against 30/70 bands
pub fn rsi(closes: &[f64]) -> Result<QuantSignal, AnalyzerError> {
    let values = run(
        RelativeStrengthIndex::new(RSI_PERIOD).map_err(indicator_error)?,
        closes,
    );
    let (prev, current) = last_two(&values)?;

    if !prev.is_finite() || !current.is_finite() {
        return Ok(QuantSignal::hold(0.5, "RSI undefined on a flat series"));
    }

    let signal = if current > RSI_OVERSOLD && prev <= RSI_OVERSOLD {
        QuantSignal::new(
            Action::Buy,
            (RSI_OVERSOLD - prev) / RSI_OVERSOLD + 0.5,
            format!("RSI recovered from oversold (below {RSI_OVERSOLD})"),
        )
    } else if current < RSI_OVERBOUGHT && prev >= RSI_OVERBOUGHT {
        QuantSignal::new(
            Action::Sell,
            (prev - RSI_OVERBOUGHT) / (100.0 - RSI_OVERBOUGHT) + 0.5,
            format!("RSI fell from overbought (above {RSI_OVERBOUGHT})"),
        )
    } else if current < RSI_OVERSOLD {
        QuantSignal::hold(0.3, format!("RSI in oversold territory ({current:.1})"))
    } else if current > RSI_OVERBOUGHT {
        QuantSignal::hold(0.3, format!("RSI in overbought territory ({current:.1})"))
    } else {
        QuantSignal::hold(0.5, format!("RSI neutral at {current:.1}"))
    };
    Ok(signal)
}

/// Mean reversion against 20 day, two sigma bands
pub fn bollinger(closes: &[f64]) -> Result<QuantSignal, AnalyzerError> {
    let bands = run(
        BollingerBands::new(BOLLINGER_PERIOD, BOLLINGER_WIDTH).map_err(indicator_error)?,
        closes,
    );
    let Some(band) = bands.last() else {
        return Err(AnalyzerError::Indicator("no closes".to_string()));
    };
    let price = closes[closes.len() - 1];

    let width = band.upper - band.lower;
    if width <= 0.0 || !width.is_finite() {
        return Ok(QuantSignal::hold(0.5, "Bollinger Bands collapsed on a flat series"));
    }
    let position = (price - band.lower) / width;

    let signal = if price <= band.lower {
        QuantSignal::new(
            Action::Buy,
            (band.lower - price) / band.lower * 10.0 + 0.7,
            "Price at/below lower Bollinger Band",
        )
    } else if price >= band.upper {
        QuantSignal::new(
            Action::Sell,
            (price - band.upper) / band.upper * 10.0 + 0.7,
            "Price at/above upper Bollinger Band",
        )
    } else if position > 0.5 {
        QuantSignal::hold(0.5, format!("Price in upper half of Bollinger Bands ({position:.2})"))
    } else {
        QuantSignal::hold(0.5, format!("Price in lower half of Bollinger Bands ({position:.2})"))
    };
    Ok(signal)
}

/// Long and short lookback price momentum
pub fn momentum(closes: &[f64]) -> Result<QuantSignal, AnalyzerError> {
    let len = closes.len();
    if len < 2 {
        return Err(AnalyzerError::Indicator(
            "momentum needs at least two closes".to_string(),
        ));
    }
    let lookback = MOMENTUM_LOOKBACK.min(len - 1);
    let price = closes[len - 1];

    let base = closes[len - lookback];
    let long = (price - base) / base;
    let short = if len > MOMENTUM_SHORT {
        let base = closes[len - MOMENTUM_SHORT];
        (price - base) / base
    } else {
        long
    };

    let signal = if long > 0.1 && short > 0.0 {
        QuantSignal::new(
            Action::Buy,
            long,
            format!("Strong positive momentum ({:.1}% over {lookback} days)", long * 100.0),
        )
    } else if long < -0.1 && short < 0.0 {
        QuantSignal::new(
            Action::Sell,
            long.abs(),
            format!("Strong negative momentum ({:.1}% over {lookback} days)", long * 100.0),
        )
    } else if long > 0.0 && short < 0.0 {
        QuantSignal::hold(0.4, "Long-term positive but short-term negative momentum")
    } else if long < 0.0 && short > 0.0 {
        QuantSignal::hold(0.6, "Long-term negative but short-term positive momentum")
    } else {
        QuantSignal::hold(0.5, format!("Neutral momentum ({:.1}%)", long * 100.0))
    };
    Ok(signal)
}

/// Run every indicator rule over `closes`
pub fn evaluate(closes: &[f64]) -> Result<Vec<QuantSignal>, AnalyzerError> {
    if closes.len() < MIN_CLOSES {
        return Err(AnalyzerError::Indicator(format!(
            "need at least {MIN_CLOSES} closes, got {}",
            closes.len()
        )));
    }
    Ok(vec![
        sma_crossover(closes)?,
        macd(closes)?,
        rsi(closes)?,
        bollinger(closes)?,
        momentum(closes)?,
    ])
}

/// Consensus across indicator signals.
///
/// Buy and sell strengths are averaged over all signals, holds included, and
/// the larger side wins once it clears the threshold.
pub fn aggregate(signals: &[QuantSignal]) -> QuantSignal {
    if signals.is_empty() {
        return QuantSignal::hold(0.5, "No indicator signals");
    }

    let count = signals.len() as f64;
    let side = |action: Action| -> (f64, Vec<&str>) {
        let matching: Vec<&QuantSignal> =
            signals.iter().filter(|s| s.action == action).collect();
        let strength = matching.iter().map(|s| s.strength).sum::<f64>() / count;
        (strength, matching.iter().map(|s| s.reason.as_str()).collect())
    };

    let (buy, buy_reasons) = side(Action::Buy);
    let (sell, sell_reasons) = side(Action::Sell);

    if buy > sell && buy > CONSENSUS_THRESHOLD {
        QuantSignal::new(Action::Buy, buy, buy_reasons.join(" | "))
    } else if sell > buy && sell > CONSENSUS_THRESHOLD {
        QuantSignal::new(Action::Sell, sell, sell_reasons.join(" | "))
    } else {
        QuantSignal::hold(0.5, "Mixed signals - no clear consensus")
    }
}
