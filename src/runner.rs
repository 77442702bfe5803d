//! Suite runner
//!
//! Runs probes one at a time in declaration order: capture, evaluate, append.
//! A probe's outcome never stops the suite, and nothing raised while running a
//! probe escapes this module.

use crate::capture::Capturer;
use crate::models::{
    ObservationKind, ProbeResult, RunReport, SuiteResult, TransportError, TransportErrorKind,
    Verdict, VerdictStatus,
};
use crate::probe::{Probe, Suite};
use crate::verdict::evaluate;
use crate::verdict::evaluator::panic_message;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle of one probe within a suite run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Pending,
    Running,
    Done(VerdictStatus),
}

impl ProbeState {
    pub fn start(self) -> Self {
        match self {
            ProbeState::Pending => ProbeState::Running,
            other => other,
        }
    }

    pub fn finish(self, status: VerdictStatus) -> Self {
        match self {
            ProbeState::Running => ProbeState::Done(status),
            other => other,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ProbeState::Done(_))
    }
}

/// Receives run events, e.g. to drive a console display
pub trait Progress {
    fn suite_started(&self, _suite: &str, _probes: usize) {}
    fn probe_started(&self, _index: usize, _probe: &Probe) {}
    fn probe_finished(&self, _index: usize, _result: &ProbeResult) {}
    fn suite_finished(&self, _result: &SuiteResult) {}
}

/// Progress sink that ignores every event
pub struct Silent;

impl Progress for Silent {}

pub struct SuiteRunner {
    capturer: Capturer,
}

impl SuiteRunner {
    pub fn new(capturer: Capturer) -> Self {
        Self { capturer }
    }

    pub fn capturer(&self) -> &Capturer {
        &self.capturer
    }

    /// Runs every suite in order and assembles the report
    pub async fn run_all(&self, suites: &[Suite], progress: &dyn Progress) -> RunReport {
        let mut report = RunReport::new(self.capturer.api_url(), self.capturer.dashboard_url());
        info!("Run {} started with {} suite(s)", report.run_id, suites.len());

        for suite in suites {
            let result = self.run(suite, progress).await;
            report.suites.push(result);
        }

        report.total_requests = self.capturer.request_count();
        report.finish();
        info!(
            "Run {} finished: {} passed, {} failed, {} inconclusive",
            report.run_id,
            report.count(VerdictStatus::Pass),
            report.count(VerdictStatus::Fail),
            report.count(VerdictStatus::Inconclusive)
        );
        report
    }

    /// Runs one suite; the result holds exactly one entry per probe
    pub async fn run(&self, suite: &Suite, progress: &dyn Progress) -> SuiteResult {
        info!("Executing suite: {} ({} probes)", suite.name(), suite.len());
        progress.suite_started(suite.name(), suite.len());

        let mut states = vec![ProbeState::Pending; suite.len()];
        let mut result = SuiteResult::new(suite.name());

        for (index, probe) in suite.probes().iter().enumerate() {
            states[index] = states[index].start();
            progress.probe_started(index, probe);

            let probe_result = self.run_probe(probe).await;
            states[index] = states[index].finish(probe_result.verdict.status);
            progress.probe_finished(index, &probe_result);

            if !result.push(probe_result) {
                error!("Suite '{}' sealed before probe {} was recorded", suite.name(), index + 1);
            }
        }

        result.seal();
        debug_assert!(states.iter().all(ProbeState::is_done));
        info!(
            "Suite '{}' completed: {}/{} passed",
            suite.name(),
            result.count(VerdictStatus::Pass),
            result.len()
        );
        progress.suite_finished(&result);
        result
    }

    /// Captures and evaluates one probe
    pub async fn run_probe(&self, probe: &Probe) -> ProbeResult {
        debug!("Probe '{}' running", probe.name());
        let started = Instant::now();

        let captured = AssertUnwindSafe(self.capturer.observe(probe.action()))
            .catch_unwind()
            .await;

        let verdict = match captured {
            Ok(observation) => {
                if let Some(e) = observation.transport_error() {
                    warn!("Probe '{}': {e}", probe.name());
                }
                evaluate(&observation, probe.predicate())
            }
            Err(panic) => {
                let kind = if probe.action().is_browser() {
                    ObservationKind::Browser
                } else {
                    ObservationKind::Http
                };
                let fault = TransportError::new(
                    TransportErrorKind::Internal,
                    panic_message(panic.as_ref()),
                );
                error!("Probe '{}' capture panicked ({kind:?}): {fault}", probe.name());
                Verdict::inconclusive(format!("no observation ({fault})"))
            }
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!("Probe '{}' -> {}", probe.name(), verdict.status);
        ProbeResult {
            name: probe.name().to_string(),
            category: probe.category(),
            verdict,
            elapsed_ms,
        }
    }

    /// Releases the browser session, if one was started
    pub async fn shutdown(&self) {
        self.capturer.close().await;
    }
}
