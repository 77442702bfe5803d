//! Unauthenticated callers must only see the generic setup status

use crate::models::{Category, HarnessConfig};
use crate::probe::{Action, HttpRequest, Probe, Suite};
use crate::verdict::Predicate;

pub struct ScopingSuite;

impl super::SuiteBuilder for ScopingSuite {
    fn name(&self) -> &str {
        "scoping"
    }

    fn description(&self) -> &str {
        "Checks that setup status leaks no workspace state without credentials"
    }

    fn build(&self, _config: &HarnessConfig) -> Suite {
        Suite::new(self.name()).with_probe(Probe::new(
            "setup status is generic without credentials",
            Category::AuthorizationScoping,
            Action::request(HttpRequest::get("/api/setup/status")),
            Predicate::All(vec![
                Predicate::json_equals("/completed", false),
                Predicate::json_equals("/steps/workspace", false),
            ]),
        ))
    }
}
