//! Core data models for the vigil harness

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Concern a probe belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    RateLimiting,
    InputValidation,
    Cors,
    AuthorizationScoping,
    InjectionSafety,
    UiBehavior,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::RateLimiting => write!(f, "Rate Limiting"),
            Category::InputValidation => write!(f, "Input Validation"),
            Category::Cors => write!(f, "CORS"),
            Category::AuthorizationScoping => write!(f, "Authorization Scoping"),
            Category::InjectionSafety => write!(f, "Injection Safety"),
            Category::UiBehavior => write!(f, "UI Behavior"),
        }
    }
}

/// Which capability produced an observation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    Http,
    Browser,
}

/// Classified reason an external call could not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    ConnectionRefused,
    Dns,
    InvalidRequest,
    Protocol,
    Navigation,
    ElementNotFound,
    Browser,
    Io,
    Internal,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::ConnectionRefused => "connection failed",
            TransportErrorKind::Dns => "dns failure",
            TransportErrorKind::InvalidRequest => "invalid request",
            TransportErrorKind::Protocol => "protocol error",
            TransportErrorKind::Navigation => "navigation failed",
            TransportErrorKind::ElementNotFound => "element not found",
            TransportErrorKind::Browser => "browser error",
            TransportErrorKind::Io => "io error",
            TransportErrorKind::Internal => "internal fault",
            TransportErrorKind::Other => "transport error",
        };
        write!(f, "{label}")
    }
}

/// An external call that never produced a usable observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Response body, parsed as JSON when the content type says so
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Raw textual form, used for substring markers and diagnostics
    pub fn text(&self) -> String {
        match self {
            ResponseBody::Empty => String::new(),
            ResponseBody::Json(v) => v.to_string(),
            ResponseBody::Text(t) => t.clone(),
        }
    }
}

/// One completed HTTP exchange
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// 1-based position of the request in its action
    pub attempt: usize,
    /// Request line, e.g. `OPTIONS http://localhost:3000/api/health`
    pub request: String,
    pub status: u16,
    /// Header names are lowercased
    pub headers: BTreeMap<String, String>,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// A request of an HTTP sequence that got no response
#[derive(Debug, Clone, PartialEq)]
pub struct FailedAttempt {
    pub attempt: usize,
    pub error: TransportError,
}

/// A value read from the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datum {
    Url(String),
    Visible(bool),
    Text(String),
    Count(usize),
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Url(u) => write!(f, "url {u}"),
            Datum::Visible(v) => write!(f, "{}", if *v { "visible" } else { "not visible" }),
            Datum::Text(t) => write!(f, "text {t:?}"),
            Datum::Count(c) => write!(f, "{c} element(s)"),
        }
    }
}

/// A labeled datum captured during a browser action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub label: String,
    pub datum: Datum,
}

/// Page state at the end of a browser action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    pub url: String,
    pub readings: Vec<Reading>,
    pub console_errors: Vec<String>,
    pub screenshots: Vec<PathBuf>,
}

impl PageSnapshot {
    pub fn reading(&self, label: &str) -> Option<&Datum> {
        self.readings
            .iter()
            .find(|r| r.label == label)
            .map(|r| &r.datum)
    }
}

/// What an action produced: captured content or a transport failure
///
/// An HTTP sequence with at least one response is captured even when some of
/// its attempts failed; those are kept next to the responses.
#[derive(Debug, Clone, PartialEq)]
pub enum Capture {
    Http {
        responses: Vec<HttpResponse>,
        failed: Vec<FailedAttempt>,
    },
    Browser(PageSnapshot),
    Failed(TransportError),
}

/// Raw result of performing one probe's action
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub kind: ObservationKind,
    pub capture: Capture,
    pub elapsed: Duration,
}

impl Observation {
    pub fn http(responses: Vec<HttpResponse>, elapsed: Duration) -> Self {
        Self::http_partial(responses, Vec::new(), elapsed)
    }

    /// HTTP observation where some attempts got no response
    pub fn http_partial(
        responses: Vec<HttpResponse>,
        failed: Vec<FailedAttempt>,
        elapsed: Duration,
    ) -> Self {
        Self {
            kind: ObservationKind::Http,
            capture: Capture::Http { responses, failed },
            elapsed,
        }
    }

    pub fn browser(snapshot: PageSnapshot, elapsed: Duration) -> Self {
        Self {
            kind: ObservationKind::Browser,
            capture: Capture::Browser(snapshot),
            elapsed,
        }
    }

    pub fn failed(kind: ObservationKind, error: TransportError, elapsed: Duration) -> Self {
        Self {
            kind,
            capture: Capture::Failed(error),
            elapsed,
        }
    }

    pub fn transport_error(&self) -> Option<&TransportError> {
        match &self.capture {
            Capture::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// HTTP exchanges in request order; empty for browser observations
    pub fn responses(&self) -> &[HttpResponse] {
        match &self.capture {
            Capture::Http { responses, .. } => responses,
            _ => &[],
        }
    }

    /// Attempts of an HTTP sequence that got no response
    pub fn failed_attempts(&self) -> &[FailedAttempt] {
        match &self.capture {
            Capture::Http { failed, .. } => failed,
            _ => &[],
        }
    }

    /// Requests sent, answered or not
    pub fn attempts(&self) -> usize {
        self.responses().len() + self.failed_attempts().len()
    }

    pub fn page(&self) -> Option<&PageSnapshot> {
        match &self.capture {
            Capture::Browser(p) => Some(p),
            _ => None,
        }
    }
}

/// Three-valued classification of a probe outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictStatus {
    Pass,
    Fail,
    Inconclusive,
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictStatus::Pass => write!(f, "PASS"),
            VerdictStatus::Fail => write!(f, "FAIL"),
            VerdictStatus::Inconclusive => write!(f, "INCONCLUSIVE"),
        }
    }
}

/// Verdict for exactly one probe execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verdict {
    pub status: VerdictStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Verdict {
    pub fn pass() -> Self {
        Self {
            status: VerdictStatus::Pass,
            detail: None,
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Fail,
            detail: Some(detail.into()),
        }
    }

    pub fn inconclusive(detail: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Inconclusive,
            detail: Some(detail.into()),
        }
    }

    pub fn with_detail(mut self, detail: Option<String>) -> Self {
        if detail.is_some() {
            self.detail = detail;
        }
        self
    }

    pub fn is_pass(&self) -> bool {
        self.status == VerdictStatus::Pass
    }
}

/// Report entry for one probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub name: String,
    pub category: Category,
    pub verdict: Verdict,
    pub elapsed_ms: u64,
}

/// Ordered verdicts of one suite run; append-only until sealed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub suite: String,
    results: Vec<ProbeResult>,
    /// Reports only hold finished suites, so a loaded one comes back sealed
    #[serde(skip, default = "sealed_on_load")]
    sealed: bool,
}

fn sealed_on_load() -> bool {
    true
}

impl SuiteResult {
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            results: Vec::new(),
            sealed: false,
        }
    }

    /// Appends a result; returns false once the suite is sealed
    pub fn push(&mut self, result: ProbeResult) -> bool {
        if self.sealed {
            return false;
        }
        self.results.push(result);
        true
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn count(&self, status: VerdictStatus) -> usize {
        self.results
            .iter()
            .filter(|r| r.verdict.status == status)
            .count()
    }
}

/// Result of a complete harness run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub api_url: String,
    pub dashboard_url: String,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub suites: Vec<SuiteResult>,
    pub total_requests: u64,
}

impl RunReport {
    pub fn new(api_url: impl Into<String>, dashboard_url: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            api_url: api_url.into(),
            dashboard_url: dashboard_url.into(),
            started_at: Local::now(),
            finished_at: None,
            suites: Vec::new(),
            total_requests: 0,
        }
    }

    pub fn suite(&self, name: &str) -> Option<&SuiteResult> {
        self.suites.iter().find(|s| s.suite == name)
    }

    fn verdicts(&self) -> impl Iterator<Item = &Verdict> {
        self.suites
            .iter()
            .flat_map(|s| s.results.iter().map(|r| &r.verdict))
    }

    /// AND over every verdict that is not INCONCLUSIVE
    pub fn all_passed(&self) -> bool {
        self.verdicts()
            .filter(|v| v.status != VerdictStatus::Inconclusive)
            .all(Verdict::is_pass)
    }

    /// 0 only when every verdict is PASS; INCONCLUSIVE counts as unclean
    pub fn exit_code(&self) -> i32 {
        if self.verdicts().all(Verdict::is_pass) {
            0
        } else {
            1
        }
    }

    pub fn count(&self, status: VerdictStatus) -> usize {
        self.verdicts().filter(|v| v.status == status).count()
    }

    pub fn total_probes(&self) -> usize {
        self.suites.iter().map(SuiteResult::len).sum()
    }

    /// Marks the run as finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }
}

/// Login used by the authenticated UI suites
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Rate-limit probe tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Identical requests sent per probe
    pub attempts: usize,
    /// Requests per minute the target is expected to allow
    pub threshold: usize,
    /// Require the first 429 exactly at attempt `threshold + 1`
    #[serde(default)]
    pub strict: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            attempts: 7,
            threshold: 5,
            strict: false,
        }
    }
}

/// Configuration for a harness run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Base URL of the target API
    pub api_url: String,
    /// Base URL of the target dashboard UI
    pub dashboard_url: String,
    /// Per-request HTTP timeout in seconds
    pub http_timeout_secs: u64,
    /// Browser navigation timeout in seconds
    pub page_timeout_secs: u64,
    /// How long to wait for a locator to match before giving up, in ms
    pub element_timeout_ms: u64,
    /// Quiet window that counts as network idle, in ms
    pub network_idle_ms: u64,
    /// Pause after page load before reading data-driven sections, in ms
    pub settle_ms: u64,
    /// User-Agent header value
    pub user_agent: String,
    pub rate_limit: RateLimitConfig,
    /// Origin expected to be reflected by CORS; defaults to the dashboard origin
    pub allowed_origin: Option<String>,
    /// Origin that must not be reflected
    pub disallowed_origin: String,
    /// Directory where screenshots are written
    pub screenshot_dir: PathBuf,
    /// Run the browser without a window
    pub headless: bool,
    #[serde(skip_serializing)]
    pub credentials: Option<Credentials>,
    /// Suites to run, in order; empty means the catalog default
    pub suites: Vec<String>,
}

impl HarnessConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    /// Origin the target is expected to trust
    pub fn allowed_origin(&self) -> String {
        if let Some(ref origin) = self.allowed_origin {
            return origin.clone();
        }
        match Url::parse(&self.dashboard_url) {
            Ok(url) => url.origin().ascii_serialization(),
            Err(_) => self.dashboard_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn screenshot_path(&self, file_name: &str) -> PathBuf {
        self.screenshot_dir.join(file_name)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            dashboard_url: "http://localhost:3001".to_string(),
            http_timeout_secs: 5,
            page_timeout_secs: 30,
            element_timeout_ms: 5000,
            network_idle_ms: 500,
            settle_ms: 2000,
            user_agent: "vigil/0.1.0".to_string(),
            rate_limit: RateLimitConfig::default(),
            allowed_origin: None,
            disallowed_origin: "http://evil.com".to_string(),
            screenshot_dir: PathBuf::from("/tmp"),
            headless: true,
            credentials: None,
            suites: Vec::new(),
        }
    }
}
