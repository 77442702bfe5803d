//! Vigil - black-box verification harness for web applications
//!
//! Runs suites of probes against a deployed API and dashboard. Each probe
//! performs one action through HTTP or a real browser, and its predicate turns
//! the resulting observation into a PASS, FAIL or INCONCLUSIVE verdict. The run
//! report drives the process exit code.

pub mod browser;
pub mod capture;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod probe;
pub mod report;
pub mod runner;
pub mod suites;
pub mod verdict;
