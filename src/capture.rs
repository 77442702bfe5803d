//! Observation capture
//!
//! Performs a probe's action through the HTTP or browser capability and
//! returns an [`Observation`]. Nothing here returns an error: every failure
//! of the external call is classified into a [`TransportError`].

use crate::browser::{BrowserDriver, ElementInfo, Locator};
use crate::error::{Result, VigilError};
use crate::http::{HttpTransport, RawResponse};
use crate::models::{
    Datum, FailedAttempt, HarnessConfig, HttpResponse, Observation, ObservationKind, PageSnapshot,
    Reading, ResponseBody, TransportError, TransportErrorKind,
};
use crate::probe::{Action, BrowserStep, Endpoint, HttpRequest, Query};
use regex::Regex;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Classifies a capability error into a transport error
pub fn classify(error: &VigilError) -> TransportError {
    let kind = match error {
        VigilError::HttpError(e) => {
            let chain = error_chain(e).to_lowercase();
            if e.is_timeout() {
                TransportErrorKind::Timeout
            } else if chain.contains("dns") || chain.contains("failed to lookup") {
                TransportErrorKind::Dns
            } else if e.is_connect() {
                TransportErrorKind::ConnectionRefused
            } else if e.is_builder() {
                TransportErrorKind::InvalidRequest
            } else {
                TransportErrorKind::Protocol
            }
        }
        VigilError::UrlError(_) => TransportErrorKind::InvalidRequest,
        VigilError::Timeout(_) => TransportErrorKind::Timeout,
        VigilError::NavigationError(..) => TransportErrorKind::Navigation,
        VigilError::ElementNotFound(_) => TransportErrorKind::ElementNotFound,
        VigilError::BrowserError(_) => TransportErrorKind::Browser,
        VigilError::IoError(_) => TransportErrorKind::Io,
        _ => TransportErrorKind::Other,
    };
    let message = match error {
        VigilError::HttpError(e) => error_chain(e),
        other => other.to_string(),
    };
    TransportError::new(kind, message)
}

/// Error message including its sources, e.g. the DNS cause under a connect error
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Interprets a body by content type; unparsable JSON stays opaque text
pub fn parse_body(content_type: Option<&str>, body: String) -> ResponseBody {
    if body.is_empty() {
        return ResponseBody::Empty;
    }
    let is_json = content_type
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("application/json") || ct.contains("+json")
        })
        .unwrap_or(false);
    if is_json {
        match serde_json::from_str(&body) {
            Ok(value) => ResponseBody::Json(value),
            Err(e) => {
                debug!("Body declared JSON but failed to parse: {e}");
                ResponseBody::Text(body)
            }
        }
    } else {
        ResponseBody::Text(body)
    }
}

fn into_response(attempt: usize, request_line: String, raw: RawResponse) -> HttpResponse {
    let mut headers = BTreeMap::new();
    for (name, value) in raw.headers {
        headers
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    let content_type = headers.get("content-type").cloned();
    HttpResponse {
        attempt,
        request: request_line,
        status: raw.status,
        body: parse_body(content_type.as_deref(), raw.body),
        headers,
    }
}

/// Runs actions against the target through the two capabilities
pub struct Capturer {
    http: Arc<dyn HttpTransport>,
    browser: Arc<dyn BrowserDriver>,
    api_url: String,
    dashboard_url: String,
    http_timeout: Duration,
    page_timeout: Duration,
    element_timeout: Duration,
    network_idle: Duration,
}

impl Capturer {
    pub fn new(
        config: &HarnessConfig,
        http: Arc<dyn HttpTransport>,
        browser: Arc<dyn BrowserDriver>,
    ) -> Self {
        Self {
            http,
            browser,
            api_url: config.api_url.clone(),
            dashboard_url: config.dashboard_url.clone(),
            http_timeout: config.http_timeout(),
            page_timeout: config.page_timeout(),
            element_timeout: config.element_timeout(),
            network_idle: Duration::from_millis(config.network_idle_ms),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn dashboard_url(&self) -> &str {
        &self.dashboard_url
    }

    pub fn request_count(&self) -> u64 {
        self.http.request_count()
    }

    pub async fn close(&self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {e}");
        }
    }

    /// Performs the action and returns a fresh observation
    pub async fn observe(&self, action: &Action) -> Observation {
        let started = Instant::now();
        match action {
            Action::Http(requests) => {
                let (responses, mut failed) = self.observe_http(requests).await;
                if responses.is_empty() && !failed.is_empty() {
                    let first = failed.swap_remove(0);
                    Observation::failed(ObservationKind::Http, first.error, started.elapsed())
                } else {
                    Observation::http_partial(responses, failed, started.elapsed())
                }
            }
            Action::Browser(steps) => match self.observe_browser(steps).await {
                Ok(snapshot) => Observation::browser(snapshot, started.elapsed()),
                Err(e) => {
                    Observation::failed(ObservationKind::Browser, classify(&e), started.elapsed())
                }
            },
        }
    }

    /// Resolves a request against its base URL, appending query parameters
    pub fn resolve(&self, request: &HttpRequest) -> Result<Url> {
        let base = match request.endpoint {
            Endpoint::Api => &self.api_url,
            Endpoint::Dashboard => &self.dashboard_url,
        };
        let mut url = Url::parse(base)?.join(&request.path)?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Sends every request in order; a failed attempt is recorded and the sequence goes on
    async fn observe_http(
        &self,
        requests: &[HttpRequest],
    ) -> (Vec<HttpResponse>, Vec<FailedAttempt>) {
        let mut responses = Vec::with_capacity(requests.len());
        let mut failed = Vec::new();
        for (i, request) in requests.iter().enumerate() {
            let attempt = i + 1;
            match self.send(request).await {
                Ok((request_line, raw)) => {
                    debug!("Attempt {attempt}: {request_line} -> {}", raw.status);
                    responses.push(into_response(attempt, request_line, raw));
                }
                Err(e) => {
                    let error = classify(&e);
                    debug!("Attempt {attempt}: {error}");
                    failed.push(FailedAttempt { attempt, error });
                }
            }
        }
        (responses, failed)
    }

    async fn send(&self, request: &HttpRequest) -> Result<(String, RawResponse)> {
        let url = self.resolve(request)?;
        let request_line = format!("{} {url}", request.method);
        let raw = bounded(self.http_timeout, self.http.send(request, url)).await?;
        Ok((request_line, raw))
    }

    fn page_url(&self, path: &str) -> Result<String> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }
        Ok(Url::parse(&self.dashboard_url)?.join(path)?.to_string())
    }

    async fn observe_browser(&self, steps: &[BrowserStep]) -> Result<PageSnapshot> {
        let mut snapshot = PageSnapshot::default();
        for step in steps {
            match step {
                BrowserStep::Navigate(path) => {
                    let url = self.page_url(path)?;
                    debug!("Navigating to {url}");
                    bounded(self.page_timeout, self.browser.navigate(&url))
                        .await
                        .map_err(|e| match e {
                            VigilError::Timeout(ms) => VigilError::NavigationError(
                                url.clone(),
                                format!("timed out after {ms} ms"),
                            ),
                            other => other,
                        })?;
                }
                BrowserStep::WaitForNetworkIdle => {
                    bounded(
                        self.page_timeout,
                        self.browser.wait_for_network_idle(self.network_idle),
                    )
                    .await?;
                }
                BrowserStep::Pause(duration) => tokio::time::sleep(*duration).await,
                BrowserStep::Fill { locator, value } => {
                    self.wait_for_actionable(locator).await?;
                    bounded(self.element_timeout, self.browser.fill(locator, value)).await?;
                }
                BrowserStep::Click(locator) => {
                    self.wait_for_actionable(locator).await?;
                    bounded(self.element_timeout, self.browser.click(locator)).await?;
                }
                BrowserStep::WaitForUrl(patterns) => {
                    self.wait_for_url(patterns).await?;
                }
                BrowserStep::Screenshot { path, full_page } => {
                    // Screenshots are debugging artifacts; losing one never fails the probe
                    if let Err(e) =
                        bounded(self.page_timeout, self.browser.screenshot(path, *full_page)).await
                    {
                        warn!("Screenshot {} failed: {e}", path.display());
                    } else {
                        snapshot.screenshots.push(path.clone());
                    }
                }
                BrowserStep::Read { label, query } => {
                    let datum = self.read(query).await?;
                    debug!("Read {label}: {datum}");
                    snapshot.readings.push(Reading {
                        label: label.clone(),
                        datum,
                    });
                }
            }
        }
        snapshot.url = bounded(self.element_timeout, self.browser.current_url()).await?;
        snapshot.console_errors =
            bounded(self.element_timeout, self.browser.console_errors()).await?;
        Ok(snapshot)
    }

    async fn read(&self, query: &Query) -> Result<Datum> {
        match query {
            Query::Url => Ok(Datum::Url(
                bounded(self.element_timeout, self.browser.current_url()).await?,
            )),
            Query::Visible(locator) => {
                let deadline = Instant::now() + self.element_timeout;
                loop {
                    let found = self.list(locator).await?;
                    if found.iter().any(|el| el.visible) {
                        return Ok(Datum::Visible(true));
                    }
                    if Instant::now() >= deadline {
                        return Ok(Datum::Visible(false));
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
            Query::Text(locator) => {
                let first = self.wait_for_element(locator).await?;
                Ok(Datum::Text(first.name))
            }
            Query::Count(locator) => Ok(Datum::Count(self.list(locator).await?.len())),
        }
    }

    async fn list(&self, locator: &Locator) -> Result<Vec<ElementInfo>> {
        bounded(self.element_timeout, self.browser.elements(locator)).await
    }

    /// Polls until the locator matches, or fails with element-not-found
    async fn wait_for_element(&self, locator: &Locator) -> Result<ElementInfo> {
        let deadline = Instant::now() + self.element_timeout;
        loop {
            if let Some(first) = self.list(locator).await?.into_iter().next() {
                return Ok(first);
            }
            if Instant::now() >= deadline {
                return Err(VigilError::ElementNotFound(locator.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Polls until the first match is visible and enabled; drivers act on the first match
    async fn wait_for_actionable(&self, locator: &Locator) -> Result<()> {
        let deadline = Instant::now() + self.element_timeout;
        loop {
            match self.list(locator).await?.first() {
                Some(first) if first.is_actionable() => return Ok(()),
                Some(_) if Instant::now() >= deadline => {
                    return Err(VigilError::ElementNotFound(format!(
                        "{locator} (hidden or disabled)"
                    )))
                }
                None if Instant::now() >= deadline => {
                    return Err(VigilError::ElementNotFound(locator.to_string()))
                }
                _ => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    async fn wait_for_url(&self, patterns: &[String]) -> Result<()> {
        let regexes = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VigilError::ConfigError(format!("invalid URL pattern: {e}")))?;
        let deadline = Instant::now() + self.page_timeout;
        loop {
            let url = bounded(self.element_timeout, self.browser.current_url()).await?;
            if regexes.iter().any(|re| re.is_match(&url)) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                debug!("URL never matched [{}], still at {url}", patterns.join(", "));
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Runs one external call under a hard timeout
async fn bounded<T, F>(limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(VigilError::Timeout(
            u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        )),
    }
}
