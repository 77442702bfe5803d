//! Browser automation capability
//!
//! The harness talks to the browser through [`BrowserDriver`]. The headless
//! Chromium implementation is only available with the `browser` feature;
//! without it, [`launch_driver`] returns a driver that fails every call, which
//! the capture layer turns into INCONCLUSIVE verdicts.

#[cfg(feature = "browser")]
pub mod chromium;

use crate::error::{Result, VigilError};
use crate::models::HarnessConfig;
use async_trait::async_trait;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Whether this build can drive a real browser
pub const AVAILABLE: bool = cfg!(feature = "browser");

/// ARIA role used for role-based element discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Heading,
    Button,
    Textbox,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Heading => "heading",
            Role::Button => "button",
            Role::Textbox => "textbox",
        };
        write!(f, "{name}")
    }
}

/// How an element's accessible name or text is matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    /// Case-insensitive substring
    Contains(String),
    /// Case-insensitive regular expression
    Pattern(String),
}

impl TextMatch {
    pub fn contains(s: impl Into<String>) -> Self {
        TextMatch::Contains(s.into())
    }

    pub fn pattern(s: impl Into<String>) -> Self {
        TextMatch::Pattern(s.into())
    }

    pub fn matches(&self, text: &str) -> bool {
        let text = text.trim();
        match self {
            TextMatch::Contains(s) => text.to_lowercase().contains(&s.to_lowercase()),
            TextMatch::Pattern(p) => RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map(|re| re.is_match(text))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextMatch::Contains(s) => write!(f, "~{s:?}"),
            TextMatch::Pattern(p) => write!(f, "/{p}/i"),
        }
    }
}

/// Which elements a locator starts from before name filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Css(String),
    Role(Role),
    /// Any element with its own text content
    Text,
}

/// Text- or role-based element discovery; never depends on styling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub target: Target,
    pub name: Option<TextMatch>,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            target: Target::Css(selector.into()),
            name: None,
        }
    }

    pub fn role(role: Role) -> Self {
        Self {
            target: Target::Role(role),
            name: None,
        }
    }

    pub fn text(text: TextMatch) -> Self {
        Self {
            target: Target::Text,
            name: Some(text),
        }
    }

    pub fn named(mut self, name: TextMatch) -> Self {
        self.name = Some(name);
        self
    }

    /// True when the element's name satisfies the name filter, if any
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.as_ref().map_or(true, |m| m.matches(name))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Target::Css(css) => write!(f, "css={css}")?,
            Target::Role(role) => write!(f, "role={role}")?,
            Target::Text => write!(f, "text")?,
        }
        if let Some(ref name) = self.name {
            write!(f, "[name={name}]")?;
        }
        Ok(())
    }
}

/// An element matched by a locator
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ElementInfo {
    /// Position among the locator target's candidates, used to act on it
    pub index: usize,
    /// Accessible name, or own text for text locators
    pub name: String,
    pub visible: bool,
    #[serde(default)]
    pub disabled: bool,
}

impl ElementInfo {
    /// Can be clicked or typed into
    pub fn is_actionable(&self) -> bool {
        self.visible && !self.disabled
    }
}

/// Capability to drive one browser session
///
/// Calls are not expected to wait for elements; polling and timeouts are
/// applied by the capture layer.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Resolves once no new network activity was seen for `quiet`
    async fn wait_for_network_idle(&self, quiet: Duration) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Elements matching the locator, name filter applied, in document order
    async fn elements(&self, locator: &Locator) -> Result<Vec<ElementInfo>>;

    async fn click(&self, locator: &Locator) -> Result<()>;

    async fn fill(&self, locator: &Locator, value: &str) -> Result<()>;

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<()>;

    /// `console.error` messages logged by the current document
    async fn console_errors(&self) -> Result<Vec<String>>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Network activity sampled from a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkSample {
    /// Document finished loading
    pub loaded: bool,
    /// Resource timing entries recorded so far
    pub resources: usize,
    /// fetch/XHR requests not yet settled
    pub in_flight: usize,
}

/// Decides network idleness from successive samples
#[derive(Debug)]
pub struct IdleTracker {
    quiet: Duration,
    last_resources: Option<usize>,
    quiet_since: Instant,
}

impl IdleTracker {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_resources: None,
            quiet_since: Instant::now(),
        }
    }

    /// Feeds a sample taken at `now`; true once the loaded page saw no activity for `quiet`
    pub fn observe(&mut self, sample: NetworkSample, now: Instant) -> bool {
        let active = sample.in_flight > 0 || self.last_resources != Some(sample.resources);
        self.last_resources = Some(sample.resources);
        if active {
            self.quiet_since = now;
            return false;
        }
        sample.loaded && now.duration_since(self.quiet_since) >= self.quiet
    }
}

/// Stub used when the crate is built without the `browser` feature
pub struct UnavailableDriver;

impl UnavailableDriver {
    fn unavailable<T>() -> Result<T> {
        Err(VigilError::BrowserError(
            "browser support requires the 'browser' feature flag. \
             Compile with: cargo build --features browser"
                .to_string(),
        ))
    }
}

#[async_trait]
impl BrowserDriver for UnavailableDriver {
    async fn navigate(&self, _url: &str) -> Result<()> {
        Self::unavailable()
    }

    async fn wait_for_network_idle(&self, _quiet: Duration) -> Result<()> {
        Self::unavailable()
    }

    async fn current_url(&self) -> Result<String> {
        Self::unavailable()
    }

    async fn elements(&self, _locator: &Locator) -> Result<Vec<ElementInfo>> {
        Self::unavailable()
    }

    async fn click(&self, _locator: &Locator) -> Result<()> {
        Self::unavailable()
    }

    async fn fill(&self, _locator: &Locator, _value: &str) -> Result<()> {
        Self::unavailable()
    }

    async fn screenshot(&self, _path: &Path, _full_page: bool) -> Result<()> {
        Self::unavailable()
    }

    async fn console_errors(&self) -> Result<Vec<String>> {
        Self::unavailable()
    }
}

/// Returns the driver for this build; the browser itself starts on first use
pub fn launch_driver(config: &HarnessConfig) -> Arc<dyn BrowserDriver> {
    #[cfg(feature = "browser")]
    {
        Arc::new(chromium::ChromiumDriver::new(config.headless))
    }
    #[cfg(not(feature = "browser"))]
    {
        let _ = config;
        Arc::new(UnavailableDriver)
    }
}
