//! Signs the shared browser session in through the login form

use super::open_page;
use crate::browser::{Locator, Role, TextMatch};
use crate::models::{Category, HarnessConfig};
use crate::probe::{Action, BrowserStep, Probe, Query, Suite};
use crate::verdict::Predicate;

pub const NAME: &str = "sign_in";

/// Where a successful sign-in may land
pub const LANDING_PATTERNS: &[&str] = &["/dashboard", "/setup"];

pub struct SignInSuite;

impl super::SuiteBuilder for SignInSuite {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Signs in through the UI; later UI suites reuse the session"
    }

    fn requires_browser(&self) -> bool {
        true
    }

    fn requires_credentials(&self) -> bool {
        true
    }

    fn build(&self, config: &HarnessConfig) -> Suite {
        let (email, password) = config
            .credentials
            .as_ref()
            .map(|c| (c.email.clone(), c.password.clone()))
            .unwrap_or_default();

        let mut steps = open_page("/auth/signin");
        steps.extend([
            BrowserStep::read(
                "welcome heading",
                Query::Visible(Locator::role(Role::Heading).named(TextMatch::contains("Welcome back"))),
            ),
            BrowserStep::read("any heading", Query::Visible(Locator::css("h1, h2"))),
            BrowserStep::fill(Locator::css("#email"), email),
            BrowserStep::fill(Locator::css("#password"), password),
            BrowserStep::Click(Locator::role(Role::Button).named(TextMatch::contains("Sign in"))),
            BrowserStep::WaitForUrl(LANDING_PATTERNS.iter().map(|p| p.to_string()).collect()),
            BrowserStep::read("url", Query::Url),
        ]);

        Suite::new(self.name()).with_probe(Probe::new(
            "sign in lands on dashboard or setup",
            Category::UiBehavior,
            Action::browser(steps),
            Predicate::All(vec![
                Predicate::Any(vec![
                    Predicate::visible("welcome heading"),
                    Predicate::visible("any heading"),
                ]),
                Predicate::url_matches(LANDING_PATTERNS.iter().copied()),
            ]),
        ))
    }
}
