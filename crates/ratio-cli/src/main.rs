//! ratio-cli: run the financial analysis pipeline over a CSV of companies.
//!
//! Loads the input table (or the built-in sample when the file is missing and
//! `MISSING_INPUT` allows it), runs every stage, then writes the enriched CSV
//! and the text report.
//!
//! Usage:
//!   cargo run -p ratio-cli -- --input data/financial_data.csv
//!   cargo run -p ratio-cli -- --input data.csv --output out.csv --report report.txt
//!   cargo run -p ratio-cli -- --summary run.json
//!
//! Valuation parameters come from the environment (or `.env`): RISK_FREE_RATE,
//! MARKET_RETURN, COST_OF_DEBT, TAX_RATE, DCF_GROWTH (`none` for a plain
//! perpetuity), SMB_FALLBACK, HML_FALLBACK, REPORT_DIGITS, MLP_SEED,
//! MISSING_INPUT (`sample` or `fail`).

use analysis_orchestrator::{load_table, render_report, save_table, AnalysisPipeline, PipelineConfig};
use anyhow::{Context, Result};
use std::path::PathBuf;

const DEFAULT_INPUT: &str = "data/financial_data.csv";
const DEFAULT_OUTPUT: &str = "data/processed/financial_analysis_results.csv";
const DEFAULT_REPORT: &str = "outputs/textual_report.txt";

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let flag = |name: &str| -> Option<PathBuf> {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .map(PathBuf::from)
    };
    let input = flag("--input").unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT));
    let output = flag("--output").unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let report_path = flag("--report").unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT));
    let summary_path = flag("--summary");

    let config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;
    tracing::info!(
        risk_free_rate = config.valuation.risk_free_rate,
        market_return = config.valuation.market_return,
        dcf = ?config.valuation.dcf,
        "Configuration loaded"
    );

    let table = load_table(&input, config.missing_input)
        .with_context(|| format!("Failed to load {}", input.display()))?;

    let outcome = AnalysisPipeline::new(&config).run(table);

    save_table(&outcome.table, &output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let report = render_report(
        &outcome.table,
        chrono::Local::now().naive_local(),
        config.report_digits,
    );
    if let Some(parent) = report_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&report_path, report)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;
    tracing::info!(path = %report_path.display(), "Textual financial report saved");

    if let Some(path) = summary_path {
        std::fs::write(&path, outcome.summary_json()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "Run summary saved");
    }

    if !outcome.diagnostics.is_clean() {
        tracing::info!(
            skipped = outcome.diagnostics.skipped.len(),
            warnings = outcome.diagnostics.warnings.len(),
            "Run finished with diagnostics"
        );
    }
    Ok(())
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  ratio-cli [--input FILE] [--output FILE] [--report FILE] [--summary FILE]");
    eprintln!();
    eprintln!("  --input    CSV of company data (default {})", DEFAULT_INPUT);
    eprintln!("  --output   enriched CSV (default {})", DEFAULT_OUTPUT);
    eprintln!("  --report   text report (default {})", DEFAULT_REPORT);
    eprintln!("  --summary  optional JSON run summary");
}
