//! Origin isolation on the API's preflight responses

use crate::models::{Category, HarnessConfig};
use crate::probe::{Action, HttpRequest, Probe, Suite};
use crate::verdict::Predicate;

const ACAO: &str = "access-control-allow-origin";

/// Checks that CORS trusts the dashboard origin and nothing else
pub struct CorsSuite;

impl super::SuiteBuilder for CorsSuite {
    fn name(&self) -> &str {
        "cors"
    }

    fn description(&self) -> &str {
        "Verifies the API reflects the trusted origin and refuses an untrusted one"
    }

    fn build(&self, config: &HarnessConfig) -> Suite {
        let allowed = config.allowed_origin();
        let preflight = |origin: &str| HttpRequest::options("/api/health").header("Origin", origin);

        // Both preflights belong to one observation: the verdict needs both
        let action = Action::Http(vec![
            preflight(&allowed),
            preflight(&config.disallowed_origin),
        ]);

        Suite::new(self.name()).with_probe(Probe::new(
            format!(
                "preflight reflects {allowed} and refuses {}",
                config.disallowed_origin
            ),
            Category::Cors,
            action,
            Predicate::All(vec![
                Predicate::header_equals(0, ACAO, allowed.as_str()),
                Predicate::header_absent(1, ACAO),
            ]),
        ))
    }
}
