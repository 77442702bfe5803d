//! JSON report export

use crate::error::Result;
use crate::models::{RunReport, VerdictStatus};
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Serialize)]
struct Summary {
    total: usize,
    passed: usize,
    failed: usize,
    inconclusive: usize,
    all_passed: bool,
    exit_code: i32,
}

#[derive(Serialize)]
struct Document<'a> {
    #[serde(flatten)]
    report: &'a RunReport,
    summary: Summary,
}

/// Serializes the report with a derived summary block
pub fn to_string(report: &RunReport) -> Result<String> {
    let document = Document {
        report,
        summary: Summary {
            total: report.total_probes(),
            passed: report.count(VerdictStatus::Pass),
            failed: report.count(VerdictStatus::Fail),
            inconclusive: report.count(VerdictStatus::Inconclusive),
            all_passed: report.all_passed(),
            exit_code: report.exit_code(),
        },
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Exports the report as a JSON file
pub fn export(report: &RunReport, output_path: &Path) -> Result<()> {
    std::fs::write(output_path, to_string(report)?)?;
    info!("JSON report saved to {}", output_path.display());
    Ok(())
}

/// Loads a RunReport from a JSON file written by [`export`]
pub fn load(input_path: &Path) -> Result<RunReport> {
    let content = std::fs::read_to_string(input_path)?;
    Ok(serde_json::from_str(&content)?)
}
