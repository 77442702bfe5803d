//! Probe catalog and suite selection

pub mod cors;
pub mod documents;
pub mod injection;
pub mod rate_limit;
pub mod scoping;
pub mod sign_in;
pub mod ui_pages;
pub mod ui_security;
pub mod validation;

use crate::error::{Result, VigilError};
use crate::models::HarnessConfig;
use crate::probe::{BrowserStep, Suite};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Trait that every suite definition implements
pub trait SuiteBuilder: Send + Sync {
    /// Returns the suite name used on the command line
    fn name(&self) -> &str;

    /// Returns a description of what this suite checks
    fn description(&self) -> &str;

    /// Whether the suite drives the browser
    fn requires_browser(&self) -> bool {
        false
    }

    /// Whether the suite needs a signed-in browser session
    fn requires_credentials(&self) -> bool {
        false
    }

    /// Builds the suite's probes for a target
    fn build(&self, config: &HarnessConfig) -> Suite;
}

/// Registry of every known suite, in default run order
pub struct Catalog {
    builders: Vec<Arc<dyn SuiteBuilder>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            builders: Vec::new(),
        }
    }

    /// Creates a catalog with every built-in suite registered
    ///
    /// Rate limiting runs last: its burst of failed sign-ins would otherwise
    /// get the UI sign-in throttled.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.register(Arc::new(cors::CorsSuite));
        catalog.register(Arc::new(validation::ValidationSuite));
        catalog.register(Arc::new(scoping::ScopingSuite));
        catalog.register(Arc::new(injection::InjectionSuite));
        catalog.register(Arc::new(ui_security::UiSecuritySuite));
        catalog.register(Arc::new(sign_in::SignInSuite));
        catalog.register(Arc::new(ui_pages::UiPagesSuite));
        catalog.register(Arc::new(documents::DocumentsSyncSuite));
        catalog.register(Arc::new(rate_limit::RateLimitSuite));
        catalog
    }

    pub fn register(&mut self, builder: Arc<dyn SuiteBuilder>) {
        self.builders.push(builder);
    }

    /// Returns (name, description) of every registered suite
    pub fn list(&self) -> Vec<(&str, &str)> {
        self.builders
            .iter()
            .map(|b| (b.name(), b.description()))
            .collect()
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn SuiteBuilder>> {
        self.builders.iter().find(|b| b.name() == name)
    }

    /// Builds the suites selected by the configuration
    ///
    /// An empty selection means every suite this build and configuration can
    /// run. Browser suites stay selectable without browser support and end
    /// up INCONCLUSIVE. The sign-in suite is added before the first suite
    /// that needs a session.
    pub fn build_enabled(
        &self,
        config: &HarnessConfig,
        browser_available: bool,
    ) -> Result<Vec<Suite>> {
        let has_credentials = config.credentials.is_some();

        let mut selected: Vec<Arc<dyn SuiteBuilder>> = if config.suites.is_empty() {
            self.builders
                .iter()
                .filter(|b| {
                    if b.requires_browser() && !browser_available {
                        warn!(
                            "Skipping suite '{}': built without the 'browser' feature",
                            b.name()
                        );
                        return false;
                    }
                    if b.requires_credentials() && !has_credentials {
                        info!("Skipping suite '{}': no credentials configured", b.name());
                        return false;
                    }
                    true
                })
                .cloned()
                .collect()
        } else {
            let mut chosen = Vec::with_capacity(config.suites.len());
            for name in &config.suites {
                let builder = self
                    .find(name)
                    .ok_or_else(|| VigilError::SuiteNotFound(name.clone()))?;
                if builder.requires_credentials() && !has_credentials {
                    return Err(VigilError::ConfigError(format!(
                        "suite '{name}' needs credentials (--email and --password)"
                    )));
                }
                chosen.push(Arc::clone(builder));
            }
            chosen
        };

        let needs_session = selected
            .iter()
            .position(|b| b.requires_credentials() && b.name() != sign_in::NAME);
        let has_sign_in = selected.iter().any(|b| b.name() == sign_in::NAME);
        if let (Some(first), false) = (needs_session, has_sign_in) {
            if let Some(sign_in) = self.find(sign_in::NAME) {
                info!("Adding suite '{}' before '{}'", sign_in::NAME, selected[first].name());
                selected.insert(first, Arc::clone(sign_in));
            }
        }

        Ok(selected.iter().map(|b| b.build(config)).collect())
    }
}

/// Navigates to a dashboard page and waits for it to go quiet
pub(crate) fn open_page(path: &str) -> Vec<BrowserStep> {
    vec![BrowserStep::navigate(path), BrowserStep::WaitForNetworkIdle]
}

/// Like [`open_page`], then pauses so data-driven sections can render
pub(crate) fn open_page_settled(path: &str, config: &HarnessConfig) -> Vec<BrowserStep> {
    let mut steps = open_page(path);
    steps.push(BrowserStep::Pause(Duration::from_millis(config.settle_ms)));
    steps
}

impl Default for Catalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}
