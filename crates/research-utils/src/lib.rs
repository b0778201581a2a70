//! Shared utilities for the research workspace
//!
//! Currently this is the tracing setup used by binaries.

pub mod logging;

pub use logging::{LogFormat, init_tracing};
