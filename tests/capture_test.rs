//! Integration tests for observation capture

mod common;

use common::{capturer, refused_url, test_config, FakeBrowser};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vigil::browser::{Locator, Role, UnavailableDriver};
use vigil::models::{Datum, ResponseBody, TransportErrorKind, VerdictStatus};
use vigil::probe::{Action, BrowserStep, HttpRequest, Query};
use vigil::verdict::{evaluate, Check, Predicate};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_json_body_and_headers_captured() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/setup/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Request-Id", "abc123")
                .set_body_json(json!({"completed": false, "steps": {"workspace": false}})),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let capture = capturer(&config, Arc::new(UnavailableDriver));

    let observation = capture
        .observe(&Action::request(HttpRequest::get("/api/setup/status")))
        .await;

    let responses = observation.responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status, 200);
    assert_eq!(responses[0].header("x-request-id"), Some("abc123"));
    assert_eq!(
        responses[0].body,
        ResponseBody::Json(json!({"completed": false, "steps": {"workspace": false}}))
    );
    assert_eq!(capture.request_count(), 1);
}

#[tokio::test]
async fn test_non_json_body_is_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(502)
                .insert_header("Content-Type", "text/html")
                .set_body_string("<h1>Bad Gateway</h1>"),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let observation = capturer(&config, Arc::new(UnavailableDriver))
        .observe(&Action::request(HttpRequest::get("/api/health")))
        .await;

    assert_eq!(
        observation.responses()[0].body,
        ResponseBody::Text("<h1>Bad Gateway</h1>".to_string())
    );
}

#[tokio::test]
async fn test_query_and_headers_are_sent() {
    let mock_server = MockServer::start().await;
    let payload = "test'; DROP TABLE workspaces; --";

    Mock::given(method("GET"))
        .and(path("/api/admin/workspaces"))
        .and(query_param("search", payload))
        .and(header("Origin", "http://allowed.example"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let request = HttpRequest::get("/api/admin/workspaces")
        .query("search", payload)
        .header("Origin", "http://allowed.example");
    let observation = capturer(&config, Arc::new(UnavailableDriver))
        .observe(&Action::request(request))
        .await;

    assert_eq!(observation.responses()[0].status, 401);
}

#[tokio::test]
async fn test_connection_refused_is_inconclusive_without_predicate() {
    let base = refused_url();
    let config = test_config(&base, &base);
    let observation = capturer(&config, Arc::new(UnavailableDriver))
        .observe(&Action::request(HttpRequest::get("/api/health")))
        .await;

    let error = observation.transport_error().expect("transport error");
    assert_eq!(error.kind, TransportErrorKind::ConnectionRefused);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let predicate = Predicate::custom("counting", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Check::pass())
    });

    let verdict = evaluate(&observation, &predicate);
    assert_eq!(verdict.status, VerdictStatus::Inconclusive);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(4)))
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri(), &mock_server.uri());
    config.http_timeout_secs = 1;
    let observation = capturer(&config, Arc::new(UnavailableDriver))
        .observe(&Action::request(HttpRequest::get("/api/health")))
        .await;

    let error = observation.transport_error().expect("transport error");
    assert_eq!(error.kind, TransportErrorKind::Timeout);
}

#[tokio::test]
async fn test_sequence_without_any_response_is_failed() {
    let base = refused_url();
    let config = test_config(&base, &base);
    let capture = capturer(&config, Arc::new(UnavailableDriver));

    let observation = capture
        .observe(&Action::repeat(HttpRequest::get("/api/health"), 4))
        .await;

    let error = observation.transport_error().expect("transport error");
    assert_eq!(error.kind, TransportErrorKind::ConnectionRefused);
    assert_eq!(capture.request_count(), 4);
}

#[tokio::test]
async fn test_sequence_keeps_going_after_a_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .with_priority(2)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri(), &mock_server.uri());
    config.http_timeout_secs = 1;
    let capture = capturer(&config, Arc::new(UnavailableDriver));
    let observation = capture
        .observe(&Action::repeat(HttpRequest::get("/api/health"), 3))
        .await;

    assert!(observation.transport_error().is_none());
    let attempts: Vec<(usize, u16)> = observation
        .responses()
        .iter()
        .map(|r| (r.attempt, r.status))
        .collect();
    assert_eq!(attempts, vec![(2, 204), (3, 204)]);
    let failed = observation.failed_attempts();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].attempt, 1);
    assert_eq!(failed[0].error.kind, TransportErrorKind::Timeout);
    assert_eq!(observation.attempts(), 3);
}

#[tokio::test]
async fn test_browser_reads_follow_redirects() {
    let driver = Arc::new(
        FakeBrowser::new()
            .redirect("/dashboard", "/auth/login")
            .element("css=form", ""),
    );
    let config = test_config("http://localhost:3000", "http://localhost:3001");
    let observation = capturer(&config, driver.clone())
        .observe(&Action::browser(vec![
            BrowserStep::navigate("/dashboard"),
            BrowserStep::WaitForNetworkIdle,
            BrowserStep::read("url", Query::Url),
            BrowserStep::read("form", Query::Visible(Locator::css("form"))),
            BrowserStep::read("forms", Query::Count(Locator::css("form"))),
        ]))
        .await;

    let page = observation.page().expect("browser observation");
    assert_eq!(page.url, "http://localhost:3001/auth/login");
    assert_eq!(
        page.reading("url"),
        Some(&Datum::Url("http://localhost:3001/auth/login".to_string()))
    );
    assert_eq!(page.reading("form"), Some(&Datum::Visible(true)));
    assert_eq!(page.reading("forms"), Some(&Datum::Count(1)));
    assert_eq!(driver.navigations(), vec!["http://localhost:3001/dashboard"]);
}

#[tokio::test]
async fn test_missing_element_reads_not_visible() {
    let driver = Arc::new(FakeBrowser::new().hidden_element("css=nav", ""));
    let config = test_config("http://localhost:3000", "http://localhost:3001");
    let observation = capturer(&config, driver)
        .observe(&Action::browser(vec![
            BrowserStep::navigate("/dashboard"),
            BrowserStep::read("nav", Query::Visible(Locator::css("nav"))),
            BrowserStep::read("stats", Query::Visible(Locator::css(".stats"))),
        ]))
        .await;

    let page = observation.page().expect("browser observation");
    assert_eq!(page.reading("nav"), Some(&Datum::Visible(false)));
    assert_eq!(page.reading("stats"), Some(&Datum::Visible(false)));
}

#[tokio::test]
async fn test_click_on_missing_element_is_transport_error() {
    let driver = Arc::new(FakeBrowser::new());
    let config = test_config("http://localhost:3000", "http://localhost:3001");
    let observation = capturer(&config, driver.clone())
        .observe(&Action::browser(vec![
            BrowserStep::navigate("/auth/login"),
            BrowserStep::Click(Locator::css("button[type=\"submit\"]")),
        ]))
        .await;

    let error = observation.transport_error().expect("transport error");
    assert_eq!(error.kind, TransportErrorKind::ElementNotFound);
    assert!(driver.clicks().is_empty());
}

#[tokio::test]
async fn test_click_on_disabled_element_is_transport_error() {
    let driver = Arc::new(FakeBrowser::new().disabled_element("role=button", "Sync Now"));
    let config = test_config("http://localhost:3000", "http://localhost:3001");
    let observation = capturer(&config, driver.clone())
        .observe(&Action::browser(vec![
            BrowserStep::navigate("/documents"),
            BrowserStep::Click(Locator::role(Role::Button)),
        ]))
        .await;

    let error = observation.transport_error().expect("transport error");
    assert_eq!(error.kind, TransportErrorKind::ElementNotFound);
    assert!(error.message.contains("disabled"), "{}", error.message);
    assert!(driver.clicks().is_empty());
}

#[tokio::test]
async fn test_navigation_failure_is_transport_error() {
    let driver = Arc::new(FakeBrowser::new().failing_navigation());
    let config = test_config("http://localhost:3000", "http://localhost:3001");
    let observation = capturer(&config, driver)
        .observe(&Action::browser(vec![BrowserStep::navigate("/auth/login")]))
        .await;

    let error = observation.transport_error().expect("transport error");
    assert_eq!(error.kind, TransportErrorKind::Navigation);
}

#[tokio::test]
async fn test_unavailable_browser_is_transport_error() {
    let config = test_config("http://localhost:3000", "http://localhost:3001");
    let observation = capturer(&config, Arc::new(UnavailableDriver))
        .observe(&Action::browser(vec![BrowserStep::navigate("/auth/login")]))
        .await;

    let error = observation.transport_error().expect("transport error");
    assert_eq!(error.kind, TransportErrorKind::Browser);
    assert!(error.message.contains("'browser' feature"));
}
