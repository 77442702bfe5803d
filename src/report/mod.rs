//! Report rendering and export

pub mod console;
pub mod json;
pub mod text;

use crate::models::RunReport;

/// Renders the human-readable summary and derives the process exit code
pub fn render(report: &RunReport) -> (String, i32) {
    (text::render(report), report.exit_code())
}
