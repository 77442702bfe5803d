//! Tour of the authenticated dashboard pages

use super::open_page_settled;
use crate::browser::{Locator, Role, TextMatch};
use crate::models::{Category, HarnessConfig};
use crate::probe::{Action, BrowserStep, Probe, Query, Suite};
use crate::verdict::Predicate;

/// One page of the tour
struct PageCheck {
    path: &'static str,
    heading: TextMatch,
    /// Accept the page URL when the heading is missing
    url_fallback: bool,
    /// Extra element that must be visible, as (label, locator)
    required: Option<(&'static str, Locator)>,
}

impl PageCheck {
    fn new(path: &'static str, heading: TextMatch) -> Self {
        Self {
            path,
            heading,
            url_fallback: false,
            required: None,
        }
    }

    fn url_fallback(mut self) -> Self {
        self.url_fallback = true;
        self
    }

    fn requires(mut self, label: &'static str, locator: Locator) -> Self {
        self.required = Some((label, locator));
        self
    }

    fn probe(self, config: &HarnessConfig) -> Probe {
        let page = self.path.trim_start_matches('/');
        let mut steps = open_page_settled(self.path, config);
        steps.push(BrowserStep::read(
            "heading",
            Query::Visible(Locator::role(Role::Heading).named(self.heading)),
        ));
        steps.push(BrowserStep::read("url", Query::Url));

        let mut heading = Predicate::visible("heading");
        if self.url_fallback {
            heading = Predicate::Any(vec![
                heading,
                Predicate::url_matches([format!(r"{}(/|\?|#|$)", regex::escape(self.path))]),
            ]);
        }

        let mut checks = vec![heading];
        if let Some((label, locator)) = self.required {
            steps.push(BrowserStep::read(label, Query::Visible(locator)));
            checks.push(Predicate::visible(label));
        }

        let predicate = if checks.len() == 1 {
            checks.remove(0)
        } else {
            Predicate::All(checks)
        };

        Probe::new(
            format!("{page} page loads"),
            Category::UiBehavior,
            Action::browser(steps),
            predicate,
        )
    }
}

fn pages() -> Vec<PageCheck> {
    vec![
        PageCheck::new("/dashboard", TextMatch::contains("Dashboard"))
            .requires("navigation", Locator::css("nav, aside, [role='navigation']")),
        PageCheck::new("/documents", TextMatch::contains("Documents")),
        PageCheck::new("/bots", TextMatch::contains("Bots")),
        PageCheck::new("/knowledge", TextMatch::contains("Knowledge")),
        PageCheck::new("/conversations", TextMatch::pattern("conversation")).url_fallback(),
        PageCheck::new("/analytics", TextMatch::pattern("analytics")).url_fallback(),
        PageCheck::new("/settings", TextMatch::pattern("settings")),
        PageCheck::new("/billing", TextMatch::pattern("billing|subscription|plan")).url_fallback(),
        PageCheck::new("/team", TextMatch::pattern("team|members")).url_fallback(),
    ]
}

pub struct UiPagesSuite;

impl super::SuiteBuilder for UiPagesSuite {
    fn name(&self) -> &str {
        "ui_pages"
    }

    fn description(&self) -> &str {
        "Visits every dashboard page and checks its heading and key controls"
    }

    fn requires_browser(&self) -> bool {
        true
    }

    fn requires_credentials(&self) -> bool {
        true
    }

    fn build(&self, config: &HarnessConfig) -> Suite {
        let mut suite = Suite::new(self.name());
        for page in pages() {
            suite.push(page.probe(config));
        }
        suite
    }
}
