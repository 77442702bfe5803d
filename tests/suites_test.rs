//! Integration tests running catalog suites against mock targets

mod common;

use common::{http_runner, test_config};
use serde_json::json;
use std::time::Duration;
use vigil::models::{HarnessConfig, VerdictStatus};
use vigil::runner::Silent;
use vigil::suites::cors::CorsSuite;
use vigil::suites::injection::InjectionSuite;
use vigil::suites::rate_limit::RateLimitSuite;
use vigil::suites::scoping::ScopingSuite;
use vigil::suites::validation::ValidationSuite;
use vigil::suites::SuiteBuilder;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn run_suite(
    builder: &dyn SuiteBuilder,
    config: &HarnessConfig,
) -> Vec<(String, VerdictStatus, String)> {
    let suite = builder.build(config);
    let result = http_runner(config).run(&suite, &Silent).await;
    assert_eq!(result.len(), suite.len());
    result
        .results()
        .iter()
        .map(|r| {
            (
                r.name.clone(),
                r.verdict.status,
                r.verdict.detail.clone().unwrap_or_default(),
            )
        })
        .collect()
}

async fn mount_signin_throttle(server: &MockServer, allowed: u64) {
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid credentials"})))
        .up_to_n_times(allowed)
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"error": "Too many requests"})))
        .with_priority(2)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_rate_limit_passes_when_throttled() {
    let mock_server = MockServer::start().await;
    mount_signin_throttle(&mock_server, 5).await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let results = run_suite(&RateLimitSuite, &config).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].1, VerdictStatus::Pass);
    assert_eq!(results[0].2, "first 429 at attempt 6 of 7");
}

#[tokio::test]
async fn test_rate_limit_passes_when_a_later_attempt_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(5)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(429).set_delay(Duration::from_secs(3)))
        .with_priority(3)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri(), &mock_server.uri());
    config.http_timeout_secs = 1;
    let results = run_suite(&RateLimitSuite, &config).await;

    assert_eq!(results[0].1, VerdictStatus::Pass, "{}", results[0].2);
    assert_eq!(results[0].2, "first 429 at attempt 6 of 7");
}

#[tokio::test]
async fn test_rate_limit_without_429_and_a_timeout_is_inconclusive() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(6)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_secs(3)))
        .with_priority(2)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri(), &mock_server.uri());
    config.http_timeout_secs = 1;
    let results = run_suite(&RateLimitSuite, &config).await;

    assert_eq!(results[0].1, VerdictStatus::Inconclusive);
    assert!(results[0].2.contains("attempt 7 got no response"), "{}", results[0].2);
}

#[tokio::test]
async fn test_rate_limit_fails_without_429() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(401))
        .expect(7)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let results = run_suite(&RateLimitSuite, &config).await;

    assert_eq!(results[0].1, VerdictStatus::Fail);
    assert!(results[0].2.contains("no 429 in 7 attempts"));
}

#[tokio::test]
async fn test_strict_rate_limit_rejects_late_throttle() {
    let mock_server = MockServer::start().await;
    mount_signin_throttle(&mock_server, 6).await;

    let mut config = test_config(&mock_server.uri(), &mock_server.uri());
    config.rate_limit.strict = true;
    let results = run_suite(&RateLimitSuite, &config).await;

    assert_eq!(results[0].1, VerdictStatus::Fail);
    assert!(results[0].2.contains("got it at attempt 7"));
}

#[tokio::test]
async fn test_validation_requires_marker() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/signup"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Bad request"})))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": "Validation failed", "details": []})),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/setup/test-slack"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"code": "VALIDATION_ERROR"})),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let results = run_suite(&ValidationSuite, &config).await;

    assert_eq!(results.len(), 5);
    // signup answers 400 without a marker
    assert_eq!(results[0].1, VerdictStatus::Fail);
    assert!(results[0].2.contains("validation marker missing"));
    assert_eq!(results[1].1, VerdictStatus::Fail);
    assert_eq!(results[2].1, VerdictStatus::Pass);
    assert_eq!(results[3].1, VerdictStatus::Pass);
    assert_eq!(results[4].1, VerdictStatus::Pass);
}

#[tokio::test]
async fn test_validation_accepting_bad_input_fails_on_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let results = run_suite(&ValidationSuite, &config).await;

    assert!(results.iter().all(|r| r.1 == VerdictStatus::Fail));
    assert!(results[0].2.contains("expected a 4xx status, got 200"));
}

#[tokio::test]
async fn test_cors_allows_trusted_and_refuses_untrusted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("OPTIONS"))
        .and(path("/api/health"))
        .and(header("Origin", "http://allowed.example"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("Access-Control-Allow-Origin", "http://allowed.example"),
        )
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("OPTIONS"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let results = run_suite(&CorsSuite, &config).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].1, VerdictStatus::Pass);
}

#[tokio::test]
async fn test_cors_reflecting_any_origin_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("OPTIONS"))
        .and(path("/api/health"))
        .and(header("Origin", "http://allowed.example"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("Access-Control-Allow-Origin", "http://allowed.example"),
        )
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("OPTIONS"))
        .and(path("/api/health"))
        .and(header("Origin", "http://evil.example"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("Access-Control-Allow-Origin", "http://evil.example"),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let results = run_suite(&CorsSuite, &config).await;

    assert_eq!(results[0].1, VerdictStatus::Fail);
    assert!(results[0].2.contains("http://evil.example"));
}

#[tokio::test]
async fn test_cors_missing_header_for_trusted_origin_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("OPTIONS"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let results = run_suite(&CorsSuite, &config).await;

    assert_eq!(results[0].1, VerdictStatus::Fail);
    assert!(results[0].2.contains("missing"));
}

#[tokio::test]
async fn test_scoping_generic_status_passes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/setup/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"completed": false, "steps": {"workspace": false}})),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let results = run_suite(&ScopingSuite, &config).await;

    assert_eq!(results[0].1, VerdictStatus::Pass);
}

#[tokio::test]
async fn test_scoping_leaked_workspace_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/setup/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"completed": true, "steps": {"workspace": true}, "workspaceId": "ws_1"}),
        ))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let results = run_suite(&ScopingSuite, &config).await;

    assert_eq!(results[0].1, VerdictStatus::Fail);
    assert!(results[0].2.contains("/completed"));
}

#[tokio::test]
async fn test_scoping_non_json_is_inconclusive() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_string("<html></html>"),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let results = run_suite(&ScopingSuite, &config).await;

    assert_eq!(results[0].1, VerdictStatus::Inconclusive);
    assert!(results[0].2.contains("not JSON"));
}

#[tokio::test]
async fn test_injection_auth_rejection_is_safe() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/admin/workspaces"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let results = run_suite(&InjectionSuite, &config).await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.1 == VerdictStatus::Pass));
}

#[tokio::test]
async fn test_injection_server_error_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/admin/workspaces"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), &mock_server.uri());
    let results = run_suite(&InjectionSuite, &config).await;

    assert!(results.iter().all(|r| r.1 == VerdictStatus::Fail));
    assert!(results[0].2.contains("server error 500"));
}
