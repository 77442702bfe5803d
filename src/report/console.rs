//! Live console output: banner, per-probe progress lines and summary

use crate::models::{HarnessConfig, ProbeResult, RunReport, SuiteResult, VerdictStatus};
use crate::probe::Probe;
use crate::runner::Progress;
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::time::Duration;

pub fn print_banner(config: &HarnessConfig) {
    let banner = r#"
    ╔═══════════════════════════════════════╗
    ║  VIGIL v0.1.0                         ║
    ║  Probe-and-verdict harness            ║
    ╚═══════════════════════════════════════╝
    "#;
    println!("{}", banner.cyan());
    println!("  {} {}", "API:".bold(), config.api_url.green());
    println!("  {} {}", "Dashboard:".bold(), config.dashboard_url.green());
}

pub fn colorize(status: VerdictStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        VerdictStatus::Pass => label.green().bold(),
        VerdictStatus::Fail => label.red().bold(),
        VerdictStatus::Inconclusive => label.yellow().bold(),
    }
}

/// Prints the rendered summary followed by colored counts
pub fn print_summary(report: &RunReport, rendered: &str) {
    println!("\n{}", "  Run Summary".bold());
    println!("  {}", "─".repeat(35));
    println!("{rendered}");
    println!(
        "  {} {} {}",
        format!("{} passed", report.count(VerdictStatus::Pass)).green(),
        format!("{} failed", report.count(VerdictStatus::Fail)).red(),
        format!("{} inconclusive", report.count(VerdictStatus::Inconclusive)).yellow(),
    );
    println!("  {} {}", "Requests sent:".bold(), report.total_requests);
}

/// Spinner while a probe runs, one colored line once it finishes
#[derive(Default)]
pub struct ConsoleProgress {
    spinner: RefCell<Option<ProgressBar>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Progress for ConsoleProgress {
    fn suite_started(&self, suite: &str, probes: usize) {
        println!("\n  {} {} ({probes} probes)", "Suite".bold(), suite.cyan().bold());
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        *self.spinner.borrow_mut() = Some(spinner);
    }

    fn probe_started(&self, index: usize, probe: &Probe) {
        if let Some(ref spinner) = *self.spinner.borrow() {
            spinner.set_message(format!("#{} {}...", index + 1, probe.name()));
        }
    }

    fn probe_finished(&self, _index: usize, result: &ProbeResult) {
        let mut line = format!(
            "  {:<14} {} {}",
            colorize(result.verdict.status),
            result.name,
            format!("({} ms)", result.elapsed_ms).dimmed()
        );
        if let Some(ref detail) = result.verdict.detail {
            line.push_str(&format!("\n      {}", detail.dimmed()));
        }
        match *self.spinner.borrow() {
            Some(ref spinner) => spinner.println(line),
            None => println!("{line}"),
        }
    }

    fn suite_finished(&self, result: &SuiteResult) {
        if let Some(spinner) = self.spinner.borrow_mut().take() {
            spinner.finish_and_clear();
        }
        println!(
            "  {} {}/{} passed",
            "→".cyan(),
            result.count(VerdictStatus::Pass),
            result.len()
        );
    }
}
