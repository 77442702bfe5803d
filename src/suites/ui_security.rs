//! Unauthenticated UI behavior of the dashboard

use super::open_page;
use crate::browser::{Locator, Role};
use crate::models::{Category, HarnessConfig};
use crate::probe::{Action, BrowserStep, HttpRequest, Probe, Query, Suite};
use crate::verdict::Predicate;
use std::time::Duration;

/// Final URLs that count as "sent to authentication"
pub const AUTH_PATTERNS: &[&str] = &["/auth", "/login"];

pub struct UiSecuritySuite;

impl super::SuiteBuilder for UiSecuritySuite {
    fn name(&self) -> &str {
        "ui_security"
    }

    fn description(&self) -> &str {
        "Login page, security headers, empty-form handling and the auth redirect"
    }

    fn requires_browser(&self) -> bool {
        true
    }

    fn build(&self, config: &HarnessConfig) -> Suite {
        let mut suite = Suite::new(self.name());

        let mut login = open_page("/auth/login");
        login.push(BrowserStep::screenshot(
            config.screenshot_path("security-test-login.png"),
            false,
        ));
        login.push(BrowserStep::read(
            "login form",
            Query::Visible(Locator::css("form")),
        ));
        login.push(BrowserStep::read(
            "email field",
            Query::Visible(Locator::role(Role::Textbox)),
        ));
        suite.push(Probe::new(
            "login page renders",
            Category::UiBehavior,
            Action::browser(login),
            Predicate::Any(vec![
                Predicate::visible("login form"),
                Predicate::visible("email field"),
            ]),
        ));

        suite.push(Probe::new(
            "login page sends security headers",
            Category::UiBehavior,
            Action::request(HttpRequest::get("/auth/login").on_dashboard()),
            Predicate::All(vec![
                Predicate::header_present(0, "x-content-type-options"),
                Predicate::header_present(0, "x-frame-options"),
            ]),
        ));

        let mut empty_submit = open_page("/auth/login");
        empty_submit.extend([
            BrowserStep::Click(Locator::css("button[type=\"submit\"]")),
            BrowserStep::Pause(Duration::from_secs(1)),
            BrowserStep::screenshot(config.screenshot_path("security-test-validation.png"), false),
            BrowserStep::read("url", Query::Url),
        ]);
        suite.push(Probe::new(
            "empty login form stays on the auth page",
            Category::UiBehavior,
            Action::browser(empty_submit),
            Predicate::url_matches(AUTH_PATTERNS.iter().copied()),
        ));

        suite.push(Probe::new(
            "dashboard redirects unauthenticated users",
            Category::UiBehavior,
            Action::browser(open_page("/dashboard")),
            Predicate::url_matches(AUTH_PATTERNS.iter().copied()),
        ));

        suite.push(Probe::new(
            "login page logs no console errors",
            Category::UiBehavior,
            Action::browser(open_page("/auth/login")),
            Predicate::NoConsoleErrors,
        ));

        suite
    }
}
