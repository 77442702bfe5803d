//! Malformed payloads must be rejected with a structured validation error

use crate::models::{Category, HarnessConfig};
use crate::probe::{Action, HttpRequest, Probe, Suite};
use crate::verdict::{Marker, Predicate};
use serde_json::{json, Value};

/// Validation checks on the auth and setup endpoints
pub struct ValidationSuite;

/// Status alone is not enough: the body must carry a validation marker
fn rejected_as_invalid() -> Predicate {
    Predicate::All(vec![
        Predicate::ClientError,
        Predicate::BodyContainsMarker(vec![
            Marker::json_equals("/code", "VALIDATION_ERROR"),
            Marker::json_contains("/error", "Validation"),
        ]),
    ])
}

fn cases() -> Vec<(&'static str, &'static str, Value)> {
    vec![
        (
            "signup rejects invalid email",
            "/api/auth/signup",
            json!({"email": "not-an-email", "password": "password123"}),
        ),
        (
            "signup rejects short password",
            "/api/auth/signup",
            json!({"email": "test@test.com", "password": "short"}),
        ),
        (
            "signin rejects invalid email format",
            "/api/auth/signin",
            json!({"email": "not-an-email", "password": "password123"}),
        ),
        (
            "test-slack rejects invalid bot token",
            "/api/setup/test-slack",
            json!({"botToken": "invalid-token", "appToken": "xapp-valid"}),
        ),
        (
            "test-slack rejects invalid app token",
            "/api/setup/test-slack",
            json!({"botToken": "xoxb-valid", "appToken": "invalid-token"}),
        ),
    ]
}

impl super::SuiteBuilder for ValidationSuite {
    fn name(&self) -> &str {
        "validation"
    }

    fn description(&self) -> &str {
        "Sends malformed payloads and expects a 4xx carrying a validation error"
    }

    fn build(&self, _config: &HarnessConfig) -> Suite {
        let mut suite = Suite::new(self.name());
        for (name, path, payload) in cases() {
            suite.push(Probe::new(
                name,
                Category::InputValidation,
                Action::request(HttpRequest::post(path).json(payload)),
                rejected_as_invalid(),
            ));
        }
        suite
    }
}
