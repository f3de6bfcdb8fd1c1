//! Offline scoring of a customer file with the local model artifact.
//!
//! Usage: `score_file <input.csv|input.xlsx> [threshold] [output.csv]`
//!
//! Prints the outcome summary and writes the prediction export to
//! `output.csv`, or to stdout when no output path is given.

use churn_workstation::config::Config;
use churn_workstation::decode::decode_upload;
use churn_workstation::export::export_csv;
use churn_workstation::oracle::LogisticOracle;
use churn_workstation::validation::validate_batch;
use churn_workstation::workstation::{check_threshold, score, summarize};
use std::env;
use std::io::Write;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the export can be piped from stdout
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Config::from_env()?;
    let args: Vec<String> = env::args().skip(1).collect();

    let input = args
        .first()
        .ok_or_else(|| anyhow::anyhow!("usage: score_file <input.csv|xlsx> [threshold] [output.csv]"))?;
    let threshold = match args.get(1) {
        Some(raw) => raw
            .parse::<f64>()
            .map_err(|_| anyhow::anyhow!("threshold must be a number, got '{}'", raw))?,
        None => config.default_threshold,
    };
    check_threshold(threshold)?;

    let oracle = LogisticOracle::from_path(
        Path::new(&config.model_path),
        config.model_sha256.as_deref(),
    )?;

    let bytes = std::fs::read(input)?;
    let records = decode_upload(input, &bytes)?;
    if config.strict_batch_validation {
        validate_batch(&records)?;
    }

    let results = score(&oracle, &records, threshold).await?;
    let summary = summarize(&results);
    eprintln!(
        "Scored {} customer(s) at threshold {}: {} churn ({:.1}%), {} stay ({:.1}%)",
        results.len(),
        threshold,
        summary.churn_count,
        summary.churn_share * 100.0,
        summary.stay_count,
        summary.stay_share * 100.0
    );

    let csv = export_csv(&results)?;
    match args.get(2) {
        Some(output) => {
            std::fs::write(output, &csv)?;
            tracing::info!("Wrote predictions to {}", output);
        }
        None => std::io::stdout().write_all(&csv)?,
    }

    Ok(())
}
