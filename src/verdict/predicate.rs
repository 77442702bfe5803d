//! Inspectable predicates over observations

use crate::models::{Datum, FailedAttempt, HttpResponse, Observation, PageSnapshot};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Outcome of applying a predicate: whether it held, plus an optional diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub holds: bool,
    pub detail: Option<String>,
}

impl Check {
    pub fn pass() -> Self {
        Self {
            holds: true,
            detail: None,
        }
    }

    pub fn pass_with(detail: impl Into<String>) -> Self {
        Self {
            holds: true,
            detail: Some(detail.into()),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            holds: false,
            detail: Some(detail.into()),
        }
    }
}

impl From<bool> for Check {
    fn from(holds: bool) -> Self {
        Self {
            holds,
            detail: None,
        }
    }
}

impl From<(bool, String)> for Check {
    fn from((holds, detail): (bool, String)) -> Self {
        Self {
            holds,
            detail: Some(detail),
        }
    }
}

/// The predicate could not interpret the observation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PredicateFault(pub String);

impl PredicateFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type CheckResult = std::result::Result<Check, PredicateFault>;

/// A recognizable marker in a response body
#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    /// JSON value at a pointer equals the given value
    JsonEquals { pointer: String, value: Value },
    /// String at a JSON pointer contains a substring
    JsonContains { pointer: String, needle: String },
    /// Raw body contains a substring
    Substring(String),
}

impl Marker {
    pub fn json_equals(pointer: impl Into<String>, value: impl Into<Value>) -> Self {
        Marker::JsonEquals {
            pointer: pointer.into(),
            value: value.into(),
        }
    }

    pub fn json_contains(pointer: impl Into<String>, needle: impl Into<String>) -> Self {
        Marker::JsonContains {
            pointer: pointer.into(),
            needle: needle.into(),
        }
    }

    fn needs_json(&self) -> bool {
        !matches!(self, Marker::Substring(_))
    }

    /// None when the marker needs JSON and the body is not JSON
    fn found_in(&self, response: &HttpResponse) -> Option<bool> {
        match self {
            Marker::Substring(s) => Some(response.body.text().contains(s.as_str())),
            Marker::JsonEquals { pointer, value } => {
                let json = response.body.as_json()?;
                Some(json.pointer(pointer) == Some(value))
            }
            Marker::JsonContains { pointer, needle } => {
                let json = response.body.as_json()?;
                Some(
                    json.pointer(pointer)
                        .and_then(Value::as_str)
                        .map(|s| s.contains(needle.as_str()))
                        .unwrap_or(false),
                )
            }
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::JsonEquals { pointer, value } => write!(f, "{pointer} == {value}"),
            Marker::JsonContains { pointer, needle } => write!(f, "{pointer} contains {needle:?}"),
            Marker::Substring(s) => write!(f, "body contains {s:?}"),
        }
    }
}

type CustomFn = dyn Fn(&Observation) -> CheckResult + Send + Sync;

/// Escape hatch for checks the built-in variants cannot express
#[derive(Clone)]
pub struct CustomCheck {
    name: String,
    check: Arc<CustomFn>,
}

impl CustomCheck {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Observation) -> CheckResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CustomCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomCheck")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Expectation over an observation
///
/// Status and body variants apply to every HTTP exchange in the observation,
/// except `AnyStatus` and `FirstStatusAt`, which look at the sequence as a whole.
/// Page variants refer to readings by label.
#[derive(Debug, Clone)]
pub enum Predicate {
    StatusEquals(u16),
    /// 4xx status
    ClientError,
    /// Anything below 500
    NotServerError,
    /// At least one exchange carries the status
    AnyStatus(u16),
    /// The status first appears exactly at this 1-based attempt
    FirstStatusAt { status: u16, attempt: usize },
    /// Any one of the markers is present
    BodyContainsMarker(Vec<Marker>),
    JsonEquals { pointer: String, value: Value },
    /// Header on the n-th exchange, optionally with an exact value
    HeaderPresent {
        response: usize,
        name: String,
        value: Option<String>,
    },
    HeaderAbsent { response: usize, name: String },
    /// Final page URL matches any of the regex patterns
    UrlMatches(Vec<String>),
    Visible(String),
    CountAtLeast { label: String, min: usize },
    TextMatches { label: String, pattern: String },
    NoConsoleErrors,
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
    Custom(CustomCheck),
}

impl Predicate {
    pub fn json_equals(pointer: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::JsonEquals {
            pointer: pointer.into(),
            value: value.into(),
        }
    }

    pub fn header_present(response: usize, name: impl Into<String>) -> Self {
        Predicate::HeaderPresent {
            response,
            name: name.into(),
            value: None,
        }
    }

    pub fn header_equals(response: usize, name: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::HeaderPresent {
            response,
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn header_absent(response: usize, name: impl Into<String>) -> Self {
        Predicate::HeaderAbsent {
            response,
            name: name.into(),
        }
    }

    pub fn url_matches<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::UrlMatches(patterns.into_iter().map(Into::into).collect())
    }

    pub fn visible(label: impl Into<String>) -> Self {
        Predicate::Visible(label.into())
    }

    pub fn count_at_least(label: impl Into<String>, min: usize) -> Self {
        Predicate::CountAtLeast {
            label: label.into(),
            min,
        }
    }

    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Observation) -> CheckResult + Send + Sync + 'static,
    {
        Predicate::Custom(CustomCheck::new(name, check))
    }

    /// Applies the predicate; pure, performs no I/O
    pub fn check(&self, observation: &Observation) -> CheckResult {
        match self {
            Predicate::StatusEquals(expected) => every_response(observation, |r| {
                if r.status == *expected {
                    Check::pass()
                } else {
                    Check::fail(format!("expected {expected}, got {}", r.status))
                }
            }),
            Predicate::ClientError => every_response(observation, |r| {
                if (400..500).contains(&r.status) {
                    Check::pass()
                } else {
                    Check::fail(format!("expected a 4xx status, got {}", r.status))
                }
            }),
            Predicate::NotServerError => every_response(observation, |r| {
                if r.status < 500 {
                    Check::pass()
                } else {
                    Check::fail(format!("server error {} for {}", r.status, r.request))
                }
            }),
            Predicate::AnyStatus(status) => {
                let responses = http_responses(observation)?;
                if let Some(r) = responses.iter().find(|r| r.status == *status) {
                    return Ok(Check::pass_with(format!(
                        "first {status} at attempt {} of {}",
                        r.attempt,
                        observation.attempts()
                    )));
                }
                all_answered(observation)?;
                Ok(Check::fail(format!(
                    "no {status} in {} attempts (statuses: {})",
                    responses.len(),
                    join_statuses(responses)
                )))
            }
            Predicate::FirstStatusAt { status, attempt } => {
                let responses = http_responses(observation)?;
                let first = responses.iter().find(|r| r.status == *status);
                if let Some(r) = first.filter(|r| r.attempt < *attempt) {
                    return Ok(Check::fail(format!(
                        "expected first {status} at attempt {attempt}, got it at attempt {}",
                        r.attempt
                    )));
                }
                // Unanswered attempts up to the expected one leave the position unknown
                if let Some(f) = observation
                    .failed_attempts()
                    .iter()
                    .find(|f| f.attempt <= *attempt)
                {
                    return Err(unanswered(f));
                }
                match first {
                    Some(r) if r.attempt == *attempt => Ok(Check::pass_with(format!(
                        "first {status} at attempt {attempt}"
                    ))),
                    Some(r) => Ok(Check::fail(format!(
                        "expected first {status} at attempt {attempt}, got it at attempt {}",
                        r.attempt
                    ))),
                    None => Ok(Check::fail(format!(
                        "no {status} in {} attempts (statuses: {})",
                        responses.len(),
                        join_statuses(responses)
                    ))),
                }
            }
            Predicate::BodyContainsMarker(markers) => {
                let responses = http_responses(observation)?;
                for r in responses {
                    let mut unreadable = false;
                    let mut found = false;
                    for marker in markers {
                        match marker.found_in(r) {
                            Some(true) => {
                                found = true;
                                break;
                            }
                            Some(false) => {}
                            None => unreadable |= marker.needs_json(),
                        }
                    }
                    if found {
                        continue;
                    }
                    if unreadable {
                        return Err(PredicateFault::new(format!(
                            "body of {} is not JSON: {}",
                            r.request,
                            truncate(&r.body.text(), 200)
                        )));
                    }
                    let wanted: Vec<String> = markers.iter().map(ToString::to_string).collect();
                    return Ok(Check::fail(format!(
                        "status {} but validation marker missing (wanted {}); body: {}",
                        r.status,
                        wanted.join(" or "),
                        truncate(&r.body.text(), 200)
                    )));
                }
                all_answered(observation)?;
                Ok(Check::pass())
            }
            Predicate::JsonEquals { pointer, value } => {
                let responses = http_responses(observation)?;
                for r in responses {
                    let json = r.body.as_json().ok_or_else(|| {
                        PredicateFault::new(format!(
                            "body of {} is not JSON: {}",
                            r.request,
                            truncate(&r.body.text(), 200)
                        ))
                    })?;
                    let actual = json.pointer(pointer);
                    if actual != Some(value) {
                        let shown = actual.map_or("missing".to_string(), ToString::to_string);
                        return Ok(Check::fail(format!(
                            "expected {pointer} == {value}, got {shown}"
                        )));
                    }
                }
                all_answered(observation)?;
                Ok(Check::pass())
            }
            Predicate::HeaderPresent {
                response,
                name,
                value,
            } => {
                let r = nth_response(observation, *response)?;
                match (r.header(name), value) {
                    (None, _) => Ok(Check::fail(format!("{name} missing on {}", r.request))),
                    (Some(actual), Some(expected)) if actual != expected => Ok(Check::fail(
                        format!("expected {name}: {expected}, got {actual}"),
                    )),
                    (Some(_), _) => Ok(Check::pass()),
                }
            }
            Predicate::HeaderAbsent { response, name } => {
                let r = nth_response(observation, *response)?;
                match r.header(name) {
                    Some(actual) => Ok(Check::fail(format!(
                        "unexpected {name}: {actual} on {}",
                        r.request
                    ))),
                    None => Ok(Check::pass()),
                }
            }
            Predicate::UrlMatches(patterns) => {
                let page = page(observation)?;
                for pattern in patterns {
                    let re = Regex::new(pattern).map_err(|e| {
                        PredicateFault::new(format!("invalid URL pattern {pattern:?}: {e}"))
                    })?;
                    if re.is_match(&page.url) {
                        return Ok(Check::pass_with(format!("landed on {}", page.url)));
                    }
                }
                Ok(Check::fail(format!(
                    "final URL {} matches none of [{}]",
                    page.url,
                    patterns.join(", ")
                )))
            }
            Predicate::Visible(label) => match reading(observation, label)? {
                Datum::Visible(true) => Ok(Check::pass()),
                Datum::Visible(false) => Ok(Check::fail(format!("{label} not visible"))),
                Datum::Count(n) if *n > 0 => Ok(Check::pass()),
                other => Ok(Check::fail(format!("{label}: {other}"))),
            },
            Predicate::CountAtLeast { label, min } => match reading(observation, label)? {
                Datum::Count(n) if n >= min => Ok(Check::pass()),
                Datum::Count(n) => Ok(Check::fail(format!(
                    "expected at least {min} {label}, found {n}"
                ))),
                other => Err(PredicateFault::new(format!(
                    "reading {label} is {other}, not a count"
                ))),
            },
            Predicate::TextMatches { label, pattern } => {
                let text = match reading(observation, label)? {
                    Datum::Text(t) | Datum::Url(t) => t,
                    other => {
                        return Err(PredicateFault::new(format!(
                            "reading {label} is {other}, not text"
                        )))
                    }
                };
                let re = Regex::new(pattern)
                    .map_err(|e| PredicateFault::new(format!("invalid pattern {pattern:?}: {e}")))?;
                if re.is_match(text) {
                    Ok(Check::pass())
                } else {
                    Ok(Check::fail(format!("{label} text {text:?} does not match {pattern:?}")))
                }
            }
            Predicate::NoConsoleErrors => {
                let page = page(observation)?;
                if page.console_errors.is_empty() {
                    Ok(Check::pass())
                } else {
                    let shown: Vec<String> = page
                        .console_errors
                        .iter()
                        .take(3)
                        .map(|e| truncate(e, 100))
                        .collect();
                    Ok(Check::fail(format!(
                        "{} console error(s): {}",
                        page.console_errors.len(),
                        shown.join(" | ")
                    )))
                }
            }
            Predicate::All(predicates) => {
                let mut details = Vec::new();
                for p in predicates {
                    let check = p.check(observation)?;
                    if !check.holds {
                        return Ok(Check {
                            holds: false,
                            detail: check.detail.or_else(|| Some(format!("{p} did not hold"))),
                        });
                    }
                    details.extend(check.detail);
                }
                Ok(Check {
                    holds: true,
                    detail: (!details.is_empty()).then(|| details.join("; ")),
                })
            }
            Predicate::Any(predicates) => {
                let mut fault = None;
                let mut details = Vec::new();
                for p in predicates {
                    match p.check(observation) {
                        Ok(check) if check.holds => return Ok(check),
                        Ok(check) => {
                            details.push(check.detail.unwrap_or_else(|| format!("{p} did not hold")))
                        }
                        Err(e) => fault = Some(e),
                    }
                }
                match fault {
                    Some(e) => Err(e),
                    None => Ok(Check::fail(details.join("; "))),
                }
            }
            Predicate::Not(inner) => {
                let check = inner.check(observation)?;
                if check.holds {
                    Ok(Check::fail(format!(
                        "expected not ({inner}){}",
                        check.detail.map(|d| format!(": {d}")).unwrap_or_default()
                    )))
                } else {
                    Ok(Check::pass())
                }
            }
            Predicate::Custom(custom) => (custom.check)(observation),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::StatusEquals(s) => write!(f, "status == {s}"),
            Predicate::ClientError => write!(f, "status is 4xx"),
            Predicate::NotServerError => write!(f, "status is not 5xx"),
            Predicate::AnyStatus(s) => write!(f, "any status == {s}"),
            Predicate::FirstStatusAt { status, attempt } => {
                write!(f, "first {status} at attempt {attempt}")
            }
            Predicate::BodyContainsMarker(markers) => {
                let m: Vec<String> = markers.iter().map(ToString::to_string).collect();
                write!(f, "body has marker ({})", m.join(" or "))
            }
            Predicate::JsonEquals { pointer, value } => write!(f, "{pointer} == {value}"),
            Predicate::HeaderPresent {
                response,
                name,
                value: Some(v),
            } => write!(f, "response #{response} has {name}: {v}"),
            Predicate::HeaderPresent { response, name, .. } => {
                write!(f, "response #{response} has {name}")
            }
            Predicate::HeaderAbsent { response, name } => {
                write!(f, "response #{response} lacks {name}")
            }
            Predicate::UrlMatches(p) => write!(f, "url matches [{}]", p.join(", ")),
            Predicate::Visible(l) => write!(f, "{l} visible"),
            Predicate::CountAtLeast { label, min } => write!(f, "{label} count >= {min}"),
            Predicate::TextMatches { label, pattern } => write!(f, "{label} =~ {pattern}"),
            Predicate::NoConsoleErrors => write!(f, "no console errors"),
            Predicate::All(ps) => write!(f, "all({})", join_display(ps)),
            Predicate::Any(ps) => write!(f, "any({})", join_display(ps)),
            Predicate::Not(p) => write!(f, "not({p})"),
            Predicate::Custom(c) => write!(f, "custom({})", c.name()),
        }
    }
}

fn join_display(predicates: &[Predicate]) -> String {
    predicates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_statuses(responses: &[HttpResponse]) -> String {
    responses
        .iter()
        .map(|r| r.status.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}...")
    }
}

fn http_responses(observation: &Observation) -> Result<&[HttpResponse], PredicateFault> {
    let responses = observation.responses();
    if responses.is_empty() {
        return Err(PredicateFault::new("predicate needs an HTTP observation"));
    }
    Ok(responses)
}

fn unanswered(failed: &FailedAttempt) -> PredicateFault {
    PredicateFault::new(format!(
        "attempt {} got no response ({})",
        failed.attempt, failed.error
    ))
}

/// Faults when part of the sequence went unanswered
fn all_answered(observation: &Observation) -> Result<(), PredicateFault> {
    match observation.failed_attempts().first() {
        Some(f) => Err(unanswered(f)),
        None => Ok(()),
    }
}

/// Response to the n-th request (0-based)
fn nth_response(observation: &Observation, n: usize) -> Result<&HttpResponse, PredicateFault> {
    let responses = http_responses(observation)?;
    if let Some(r) = responses.iter().find(|r| r.attempt == n + 1) {
        return Ok(r);
    }
    if let Some(f) = observation
        .failed_attempts()
        .iter()
        .find(|f| f.attempt == n + 1)
    {
        return Err(unanswered(f));
    }
    Err(PredicateFault::new(format!(
        "no response #{n}; only {} captured",
        responses.len()
    )))
}

/// A violation on any response fails; otherwise every attempt must have been answered
fn every_response<F>(observation: &Observation, check: F) -> CheckResult
where
    F: Fn(&HttpResponse) -> Check,
{
    for r in http_responses(observation)? {
        let c = check(r);
        if !c.holds {
            return Ok(c);
        }
    }
    all_answered(observation)?;
    Ok(Check::pass())
}

fn page(observation: &Observation) -> Result<&PageSnapshot, PredicateFault> {
    observation
        .page()
        .ok_or_else(|| PredicateFault::new("predicate needs a browser observation"))
}

fn reading<'a>(observation: &'a Observation, label: &str) -> Result<&'a Datum, PredicateFault> {
    page(observation)?
        .reading(label)
        .ok_or_else(|| PredicateFault::new(format!("no reading labeled {label}")))
}
