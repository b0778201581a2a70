//! Command-line interface for the research engine

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use research_engine::{
    AlphaVantageFundamentals, AssetClass, ResearchConfig, ResearchEngine, ResearchError,
    ResearchReport, ResearchRequest, RiskPreference, YahooMarketData,
};
use research_utils::LogFormat;
use rust_decimal::Decimal;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Markdown narrative
    #[default]
    Markdown,
    /// Full report as JSON
    Json,
    /// Picks as a table
    Table,
}

#[derive(Parser, Debug)]
#[command(name = "research")]
#[command(about = "Generate a ranked, budget-sized investment research report", long_about = None)]
struct Args {
    /// Asset class to research (repeatable): stocks, etfs, crypto, bonds, mutual_funds
    #[arg(short, long = "asset-class", required = true)]
    asset_class: Vec<AssetClass>,

    /// Budget to allocate, in account currency
    #[arg(short, long)]
    budget: Decimal,

    /// Risk preference: conservative, moderate, aggressive
    #[arg(short, long, default_value = "moderate")]
    risk: RiskPreference,

    /// Restrict research to these tickers (repeatable)
    #[arg(short, long = "ticker")]
    ticker: Vec<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,

    /// Log output format: pretty or json
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    research_utils::init_tracing(args.log_format);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ResearchError>() {
                Some(research) => eprintln!("{}", research.user_message()),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => ResearchConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ResearchConfig::default(),
    }
    .with_env_overrides()?;

    let tickers = (!args.ticker.is_empty()).then_some(args.ticker);
    let request = ResearchRequest::new(args.asset_class, args.budget, args.risk, tickers)?;

    let engine = ResearchEngine::builder()
        .config(config)
        .market_data(Arc::new(market_data()))
        .build()?;

    info!("Starting research");
    let report = engine.research(&request).await?;

    match args.format {
        OutputFormat::Markdown => println!("{}", report.narrative),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => println!("{}", picks_table(&report)),
    }
    Ok(())
}

/// Yahoo prices, with Alpha Vantage fundamentals when a key is configured
fn market_data() -> YahooMarketData {
    let yahoo = YahooMarketData::new();
    match AlphaVantageFundamentals::from_env() {
        Ok(fundamentals) => yahoo.with_fundamentals(Arc::new(fundamentals)),
        Err(e) => {
            warn!(error = %e, "Fundamentals unavailable, running without fundamental analysis");
            yahoo
        }
    }
}

fn picks_table(report: &ResearchReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Rank", "Ticker", "Class", "Price", "1Y Yield", "Confidence", "Risk", "Alloc %",
            "Amount",
        ]);

    for pick in &report.picks {
        table.add_row(vec![
            pick.rank.to_string(),
            pick.ticker.clone(),
            pick.asset_class.to_string(),
            format!("${:.2}", pick.current_price),
            format!("{:.1}%", pick.expected_yield * 100.0),
            format!("{:.0}%", pick.confidence * 100.0),
            pick.risk_level.to_string(),
            format!("{:.2}%", pick.allocation_percent),
            format!("${:.2}", pick.allocation_amount),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_repeated_flags() {
        let args = Args::try_parse_from([
            "research",
            "--asset-class",
            "stocks",
            "--asset-class",
            "etf",
            "--budget",
            "500",
            "--risk",
            "aggressive",
            "--ticker",
            "AAPL",
            "--format",
            "table",
        ])
        .unwrap();
        assert_eq!(args.asset_class, [AssetClass::Stocks, AssetClass::Etfs]);
        assert_eq!(args.budget, Decimal::from(500));
        assert_eq!(args.risk, RiskPreference::Aggressive);
        assert_eq!(args.ticker, ["AAPL"]);
        assert!(matches!(args.format, OutputFormat::Table));
        assert_eq!(args.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_asset_class_required() {
        assert!(Args::try_parse_from(["research", "--budget", "100"]).is_err());
        assert!(
            Args::try_parse_from(["research", "--asset-class", "gold", "--budget", "100"])
                .is_err()
        );
    }
}
