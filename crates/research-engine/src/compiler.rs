//! Report assembly and markdown narrative

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{
    AnalyzerKind, DropReason, DroppedCandidate, Pick, ResearchReport, ResearchRequest,
};

/// Identity and time of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportStamp {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
}

impl ReportStamp {
    /// Fresh random id at the current time
    pub fn now() -> Self {
        Self {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
        }
    }

    pub fn new(id: Uuid, generated_at: DateTime<Utc>) -> Self {
        Self { id, generated_at }
    }
}

/// Everything the compiler needs from the pipeline
#[derive(Debug, Clone)]
pub struct ReportInputs<'a> {
    pub request: &'a ResearchRequest,
    pub universe_size: usize,
    pub picks: Vec<Pick>,
    /// Universe, analysis and aggregation drops, in that order
    pub dropped: Vec<DroppedCandidate>,
    /// Weight vector applied for the request's risk preference
    pub weights: Vec<(AnalyzerKind, f64)>,
    pub deadline_exceeded: bool,
}

/// Builds the final report. Output depends only on its inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportCompiler;

impl ReportCompiler {
    pub fn compile(&self, inputs: ReportInputs<'_>, stamp: ReportStamp) -> ResearchReport {
        let narrative = narrative(&inputs, stamp.generated_at);
        let request = inputs.request;

        ResearchReport {
            id: stamp.id,
            generated_at: stamp.generated_at,
            asset_classes: request.asset_classes().to_vec(),
            budget: request.budget(),
            risk_preference: request.risk_preference(),
            universe_size: inputs.universe_size,
            picks: inputs.picks,
            dropped: inputs.dropped,
            narrative,
        }
    }
}

fn narrative(inputs: &ReportInputs<'_>, generated_at: DateTime<Utc>) -> String {
    let request = inputs.request;
    let mut report = String::new();

    report.push_str("# Investment Research Report\n\n");
    report.push_str(&format!(
        "Generated: {}\n\n",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    report.push_str("## Summary\n\n");
    report.push_str(&format!("- **Budget**: ${:.2}\n", request.budget()));
    report.push_str(&format!(
        "- **Risk Profile**: {}\n",
        title_case(request.risk_preference().as_str())
    ));
    report.push_str(&format!(
        "- **Asset Classes**: {}\n",
        request
            .asset_classes()
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    ));
    report.push_str(&format!(
        "- **Universe Screened**: {} assets\n\n",
        inputs.universe_size
    ));

    report.push_str("## Methodology\n\n");
    report.push_str(&format!(
        "Each candidate was scored by independent analyzers and combined with the {} weight vector: ",
        request.risk_preference()
    ));
    let weights = inputs
        .weights
        .iter()
        .map(|(kind, weight)| format!("{kind} {:.0}%", weight * 100.0))
        .collect::<Vec<_>>()
        .join(", ");
    report.push_str(&weights);
    report.push_str(". Positions are sized by conviction (strength x confidence) under a per-pick cap.\n");
    if inputs.deadline_exceeded {
        report.push_str(
            "\nThe analysis deadline was reached; calls still running at that point were abandoned.\n",
        );
    }
    report.push('\n');

    report.push_str(&format!("## Top {} Investment Picks\n\n", inputs.picks.len()));
    for pick in &inputs.picks {
        report.push_str(&format!("### {}. {}\n\n", pick.rank, pick.ticker));
        report.push_str(&format!("- **Current Price**: ${:.2}\n", pick.current_price));
        report.push_str(&format!(
            "- **Expected 1Y Yield**: {:.1}%\n",
            pick.expected_yield * 100.0
        ));
        report.push_str(&format!(
            "- **Confidence Score**: {:.0}%\n",
            pick.confidence * 100.0
        ));
        report.push_str(&format!("- **Risk Level**: {}\n", pick.risk_level));
        report.push_str(&format!(
            "- **Recommended Allocation**: {:.2}% (${:.2})\n",
            pick.allocation_percent, pick.allocation_amount
        ));
        report.push_str("- **Rationale**:\n");
        for line in pick.rationale.lines() {
            report.push_str(&format!("  - {line}\n"));
        }
        report.push('\n');
    }

    if !inputs.dropped.is_empty() {
        report.push_str("## Dropped Candidates\n\n");
        for dropped in &inputs.dropped {
            let stage = match dropped.reason {
                DropReason::NotTradable => "universe",
                DropReason::NoSuccessfulAnalyzers { .. } => "analysis",
                DropReason::InsufficientConfidence { .. } => "aggregation",
            };
            report.push_str(&format!(
                "- **{}** ({stage}): {}\n",
                dropped.ticker, dropped.reason
            ));
        }
        report.push('\n');
    }

    report.push_str("## Disclaimer\n\n");
    report.push_str(
        "This report is for informational purposes only and does not constitute financial advice. \
         All investments carry risk. Past performance does not guarantee future results.\n",
    );

    report
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
