//! Indicator signals and return statistics over daily closes

pub mod returns;
pub mod signals;

pub use returns::ReturnStats;
pub use signals::{Action, QuantSignal};
