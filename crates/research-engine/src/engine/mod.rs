//! Research engine
//!
//! Runs the pipeline from request to report: universe, analysis, aggregation,
//! ranking, allocation and compilation.

pub mod research_engine;

pub use research_engine::{ResearchEngine, ResearchEngineBuilder};
