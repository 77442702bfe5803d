//! Plain-text run summary

use crate::models::{RunReport, VerdictStatus};
use tabled::builder::Builder;
use tabled::settings::object::Columns;
use tabled::settings::{Style, Width};

const DETAIL_WIDTH: usize = 80;

/// One table row per probe, followed by verdict counts and the outcome line
pub fn render(report: &RunReport) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Suite", "Probe", "Verdict", "Detail"]);

    for suite in &report.suites {
        for result in suite.results() {
            builder.push_record([
                suite.suite.clone(),
                result.name.clone(),
                result.verdict.status.to_string(),
                result.verdict.detail.clone().unwrap_or_default(),
            ]);
        }
    }

    let mut table = builder.build();
    table
        .with(Style::rounded())
        .modify(Columns::single(3), Width::wrap(DETAIL_WIDTH));

    let mut out = String::new();
    out.push_str(&format!("Run {} against {}\n", report.run_id, report.api_url));
    out.push_str(&table.to_string());
    out.push('\n');
    out.push_str(&counts_line(report));
    out.push('\n');
    out.push_str(outcome_line(report));
    out.push('\n');
    out
}

pub fn counts_line(report: &RunReport) -> String {
    format!(
        "{} probes: {} passed, {} failed, {} inconclusive",
        report.total_probes(),
        report.count(VerdictStatus::Pass),
        report.count(VerdictStatus::Fail),
        report.count(VerdictStatus::Inconclusive)
    )
}

pub fn outcome_line(report: &RunReport) -> &'static str {
    if report.exit_code() == 0 {
        "All probes passed"
    } else if report.all_passed() {
        "No failures, but some probes were inconclusive"
    } else {
        "Some probes failed"
    }
}
