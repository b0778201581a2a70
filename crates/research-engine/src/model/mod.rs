//! Shared data model

pub mod report;
pub mod request;
pub mod signal;

pub use report::{DropReason, DroppedCandidate, Pick, ResearchReport, RiskLevel};
pub use request::{AssetClass, ResearchRequest, RiskPreference};
pub use signal::{AnalysisSignal, AnalyzerKind, CandidateAsset, CompositeScore, SignalStatus, metrics};
