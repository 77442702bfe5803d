//! SQL metacharacters in search parameters must not crash the API

use crate::models::{Category, HarnessConfig};
use crate::probe::{Action, HttpRequest, Probe, Suite};
use crate::verdict::Predicate;

pub const PAYLOADS: &[&str] = &[
    "test'; DROP TABLE workspaces; --",
    "test%' OR '1'='1",
    "test.ilike.%admin%",
];

pub struct InjectionSuite;

impl super::SuiteBuilder for InjectionSuite {
    fn name(&self) -> &str {
        "injection"
    }

    fn description(&self) -> &str {
        "Sends SQL metacharacter payloads to admin search; any non-5xx is safe"
    }

    fn build(&self, _config: &HarnessConfig) -> Suite {
        let mut suite = Suite::new(self.name());
        for payload in PAYLOADS {
            // 401 and 400 both mean the payload never reached a query
            suite.push(Probe::new(
                format!("admin search survives {payload:?}"),
                Category::InjectionSafety,
                Action::request(HttpRequest::get("/api/admin/workspaces").query("search", *payload)),
                Predicate::NotServerError,
            ));
        }
        suite
    }
}
