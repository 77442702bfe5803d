//! Probe and suite definitions
//!
//! A probe pairs an action against the target with a predicate over the
//! observation that action produces. Actions are plain data interpreted by
//! the capture layer, so a probe can be inspected without running it.

use crate::browser::Locator;
use crate::models::Category;
use crate::verdict::Predicate;
use reqwest::Method;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// Which base URL a request path is resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Api,
    Dashboard,
}

/// One HTTP request, relative to a target base URL
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub endpoint: Endpoint,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub json: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: Endpoint::Api,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            json: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn options(path: impl Into<String>) -> Self {
        Self::new(Method::OPTIONS, path)
    }

    /// Resolves the path against the dashboard instead of the API
    pub fn on_dashboard(mut self) -> Self {
        self.endpoint = Endpoint::Dashboard;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }
}

/// Datum read from the page into a labeled reading
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Url,
    Visible(Locator),
    Text(Locator),
    Count(Locator),
}

/// One interaction with the shared browser session
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserStep {
    /// Path relative to the dashboard, or an absolute URL
    Navigate(String),
    WaitForNetworkIdle,
    Pause(Duration),
    Fill { locator: Locator, value: String },
    Click(Locator),
    /// Waits until the URL matches any pattern; a timeout is not an error
    WaitForUrl(Vec<String>),
    Screenshot { path: PathBuf, full_page: bool },
    Read { label: String, query: Query },
}

impl BrowserStep {
    pub fn navigate(path: impl Into<String>) -> Self {
        BrowserStep::Navigate(path.into())
    }

    pub fn fill(locator: Locator, value: impl Into<String>) -> Self {
        BrowserStep::Fill {
            locator,
            value: value.into(),
        }
    }

    pub fn read(label: impl Into<String>, query: Query) -> Self {
        BrowserStep::Read {
            label: label.into(),
            query,
        }
    }

    pub fn screenshot(path: impl Into<PathBuf>, full_page: bool) -> Self {
        BrowserStep::Screenshot {
            path: path.into(),
            full_page,
        }
    }
}

/// What a probe does to the target
#[derive(Debug, Clone)]
pub enum Action {
    /// Requests sent in order; an attempt that gets no response does not stop the rest
    Http(Vec<HttpRequest>),
    Browser(Vec<BrowserStep>),
}

impl Action {
    pub fn request(request: HttpRequest) -> Self {
        Action::Http(vec![request])
    }

    /// The same request sent `times` times back to back
    pub fn repeat(request: HttpRequest, times: usize) -> Self {
        Action::Http(vec![request; times])
    }

    pub fn browser(steps: Vec<BrowserStep>) -> Self {
        Action::Browser(steps)
    }

    pub fn is_browser(&self) -> bool {
        matches!(self, Action::Browser(_))
    }
}

/// A single named check
#[derive(Debug, Clone)]
pub struct Probe {
    name: String,
    category: Category,
    action: Action,
    predicate: Predicate,
}

impl Probe {
    pub fn new(
        name: impl Into<String>,
        category: Category,
        action: Action,
        predicate: Predicate,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            action,
            predicate,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

/// An ordered group of probes sharing a concern
#[derive(Debug, Clone)]
pub struct Suite {
    name: String,
    probes: Vec<Probe>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            probes: Vec::new(),
        }
    }

    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn push(&mut self, probe: Probe) {
        self.probes.push(probe);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}
