//! Sync status cards and controls on the documents page

use super::open_page_settled;
use crate::browser::{Locator, Role, TextMatch};
use crate::models::{Category, HarnessConfig};
use crate::probe::{Action, BrowserStep, Probe, Query, Suite};
use crate::verdict::Predicate;

pub struct DocumentsSyncSuite;

fn button(name: &str) -> Locator {
    Locator::role(Role::Button).named(TextMatch::contains(name))
}

/// Loads the documents page afresh, then runs `steps` on it
fn on_documents_page(config: &HarnessConfig, steps: Vec<BrowserStep>) -> Action {
    let mut all = open_page_settled("/documents", config);
    all.extend(steps);
    Action::browser(all)
}

fn visible_probe(config: &HarnessConfig, name: &str, label: &str, locator: Locator) -> Probe {
    Probe::new(
        name,
        Category::UiBehavior,
        on_documents_page(config, vec![BrowserStep::read(label, Query::Visible(locator))]),
        Predicate::visible(label),
    )
}

impl super::SuiteBuilder for DocumentsSyncSuite {
    fn name(&self) -> &str {
        "documents_sync"
    }

    fn description(&self) -> &str {
        "Checks the documents page sync cards, source tabs, totals and Sync Now"
    }

    fn requires_browser(&self) -> bool {
        true
    }

    fn requires_credentials(&self) -> bool {
        true
    }

    fn build(&self, config: &HarnessConfig) -> Suite {
        let mut suite = Suite::new(self.name());

        suite.push(Probe::new(
            "documents page opens without auth redirect",
            Category::UiBehavior,
            on_documents_page(
                config,
                vec![
                    BrowserStep::screenshot(
                        config.screenshot_path("documents_page_initial.png"),
                        true,
                    ),
                    BrowserStep::read("url", Query::Url),
                    BrowserStep::read(
                        "header",
                        Query::Visible(Locator::css("h1").named(TextMatch::contains("Documents"))),
                    ),
                ],
            ),
            Predicate::All(vec![
                Predicate::Not(Box::new(Predicate::url_matches(["/auth"]))),
                Predicate::visible("header"),
            ]),
        ));

        suite.push(visible_probe(
            config,
            "google drive sync card visible",
            "google drive card",
            Locator::text(TextMatch::contains("Google Drive")),
        ));
        suite.push(visible_probe(
            config,
            "website scraping card visible",
            "website scraping card",
            Locator::text(TextMatch::contains("Website Scraping")),
        ));

        suite.push(Probe::new(
            "source filter tabs visible",
            Category::UiBehavior,
            on_documents_page(
                config,
                vec![
                    BrowserStep::read("all tab", Query::Visible(button("All"))),
                    BrowserStep::read("drive tab", Query::Visible(button("Drive"))),
                    BrowserStep::read("website tab", Query::Visible(button("Website"))),
                ],
            ),
            Predicate::All(vec![
                Predicate::visible("all tab"),
                Predicate::visible("drive tab"),
                Predicate::visible("website tab"),
            ]),
        ));

        suite.push(visible_probe(
            config,
            "total documents badge visible",
            "total badge",
            Locator::text(TextMatch::pattern(r"\d+ total")),
        ));

        suite.push(Probe::new(
            "sync now button present",
            Category::UiBehavior,
            on_documents_page(
                config,
                vec![
                    BrowserStep::read("sync now", Query::Count(button("Sync Now"))),
                    BrowserStep::screenshot(config.screenshot_path("documents_page_final.png"), true),
                ],
            ),
            Predicate::count_at_least("sync now", 1),
        ));

        suite
    }
}
