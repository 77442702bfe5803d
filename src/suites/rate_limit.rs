//! Repeated failed sign-ins must eventually be throttled

use crate::models::{Category, HarnessConfig};
use crate::probe::{Action, HttpRequest, Probe, Suite};
use crate::verdict::Predicate;
use serde_json::json;

pub struct RateLimitSuite;

/// Expectation over the sequence of sign-in statuses
pub fn throttled(config: &HarnessConfig) -> Predicate {
    if config.rate_limit.strict {
        Predicate::FirstStatusAt {
            status: 429,
            attempt: config.rate_limit.threshold + 1,
        }
    } else {
        Predicate::AnyStatus(429)
    }
}

impl super::SuiteBuilder for RateLimitSuite {
    fn name(&self) -> &str {
        "rate_limit"
    }

    fn description(&self) -> &str {
        "Sends a burst of failed sign-ins and expects a 429 once over the limit"
    }

    fn build(&self, config: &HarnessConfig) -> Suite {
        let limits = &config.rate_limit;
        let signin = HttpRequest::post("/api/auth/signin")
            .json(json!({"email": "test@test.com", "password": "wrongpassword"}));

        Suite::new(self.name()).with_probe(Probe::new(
            format!(
                "signin throttles after {} attempts ({} sent)",
                limits.threshold, limits.attempts
            ),
            Category::RateLimiting,
            Action::repeat(signin, limits.attempts),
            throttled(config),
        ))
    }
}
