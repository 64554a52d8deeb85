// tests/health_tests.rs
mod common;

use async_trait::async_trait;
use common::{parse_duration, ScriptedChecker};
use hyper::header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA};
use hyper::{Body, Request, Response, StatusCode};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use vital::app;
use vital::config::Config;
use vital::health::{
    CheckContext, CheckOutcome, Checker, HealthHandler, LiveResponse, ReadyOptions, ReadyResponse,
    Status,
};
use vital::server::ServerBuilder;

struct PanickingChecker;

#[async_trait]
impl Checker for PanickingChecker {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn check(&self, _ctx: &CheckContext) -> CheckOutcome {
        panic!("checker exploded");
    }
}

fn handler(checkers: Vec<Arc<dyn Checker>>, options: ReadyOptions) -> HealthHandler {
    HealthHandler::builder()
        .version("1.2.3")
        .environment("eu-central-1-dev")
        .checkers(checkers)
        .options(options)
        .build()
}

async fn get(handler: &HealthHandler, path: &str) -> Response<Body> {
    let req = Request::get(path).body(Body::empty()).unwrap();
    handler.handle(req).await
}

async fn ready(handler: &HealthHandler) -> (StatusCode, ReadyResponse) {
    let response = get(handler, "/health/ready").await;
    let status = response.status();
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn names(response: &ReadyResponse) -> Vec<&str> {
    response.checks.iter().map(|c| c.name.as_str()).collect()
}

#[tokio::test]
async fn test_live_is_ok_with_cache_headers() {
    let handler = handler(
        vec![ScriptedChecker::failing("db", "down").shared()],
        ReadyOptions::default(),
    );

    let response = get(&handler, "/health/live").await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[CACHE_CONTROL], "no-store, no-cache");
    assert_eq!(headers[PRAGMA], "no-cache");
    assert_eq!(headers[EXPIRES], "Thu, 01 Jan 1970 00:00:00 GMT");
    assert_eq!(headers[CONTENT_TYPE], "application/json");

    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let live: LiveResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(live.status, Status::Ok);
    assert_eq!(live.version, "1.2.3");
    assert_eq!(live.environment, "eu-central-1-dev");
}

#[tokio::test(start_paused = true)]
async fn test_all_ok_scenario() {
    let handler = handler(
        vec![
            ScriptedChecker::ok("db").delayed(20).shared(),
            ScriptedChecker::ok("cache").delayed(10).shared(),
        ],
        ReadyOptions::unbounded().with_overall_timeout(Duration::from_secs(2)),
    );

    let (status, response) = ready(&handler).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.status, Status::Ok);
    assert_eq!(names(&response), ["db", "cache"]);
    assert!(response.checks.iter().all(|c| c.status == Status::Ok));
    assert_eq!(response.version, "1.2.3");
    assert_eq!(response.environment, "eu-central-1-dev");
}

#[tokio::test(start_paused = true)]
async fn test_any_error_is_503_and_others_stay_ok() {
    let handler = handler(
        vec![
            ScriptedChecker::ok("db").shared(),
            ScriptedChecker::failing("redis", "connection refused").shared(),
            ScriptedChecker::ok("queue").delayed(5).shared(),
        ],
        ReadyOptions::default(),
    );

    let (status, response) = ready(&handler).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.status, Status::Error);
    assert_eq!(response.checks[0].status, Status::Ok);
    assert_eq!(response.checks[1].status, Status::Error);
    assert_eq!(response.checks[1].message.as_deref(), Some("connection refused"));
    assert_eq!(response.checks[2].status, Status::Ok);
}

#[tokio::test(start_paused = true)]
async fn test_fast_and_slow_with_per_check_timeout() {
    let handler = handler(
        vec![
            ScriptedChecker::ok("fast").delayed(10).shared(),
            ScriptedChecker::ok("slow").delayed(2000).shared(),
        ],
        ReadyOptions::unbounded()
            .with_overall_timeout(Duration::from_secs(1))
            .with_per_check_timeout(Some(Duration::from_millis(50))),
    );

    let (status, response) = ready(&handler).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(names(&response), ["fast", "slow"]);
    assert_eq!(response.checks[0].status, Status::Ok);
    assert_eq!(response.checks[1].status, Status::Error);
    let message = response.checks[1].message.as_deref().unwrap();
    assert!(message.contains("deadline"), "{message}");
}

#[tokio::test(start_paused = true)]
async fn test_check_ignoring_deadline_is_overridden() {
    let handler = handler(
        vec![ScriptedChecker::ok("stubborn").delayed(300).ignoring_context().shared()],
        ReadyOptions::unbounded().with_overall_timeout(Duration::from_millis(100)),
    );

    let (status, response) = ready(&handler).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let check = &response.checks[0];
    assert_eq!(check.status, Status::Error);
    assert_eq!(check.message.as_deref(), Some("context deadline exceeded"));
    assert!(parse_duration(&check.duration).unwrap() >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_zero_overall_timeout_waits_for_slow_check() {
    let handler = handler(
        vec![ScriptedChecker::ok("slow").delayed(3000).shared()],
        ReadyOptions::unbounded(),
    );

    let (status, response) = ready(&handler).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.checks[0].status, Status::Ok);
    assert_eq!(response.checks[0].message, None);
}

#[tokio::test]
async fn test_no_checkers() {
    let handler = handler(Vec::new(), ReadyOptions::default());

    let response = get(&handler, "/health/ready").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["status"], "ok");
    assert_eq!(value["checks"], serde_json::json!([]));
}

#[tokio::test(start_paused = true)]
async fn test_every_duration_parses() {
    let handler = handler(
        vec![
            ScriptedChecker::ok("instant").shared(),
            ScriptedChecker::ok("short").delayed(7).shared(),
            ScriptedChecker::failing("broken", "nope").delayed(1).shared(),
            ScriptedChecker::ok("late").delayed(900).shared(),
        ],
        ReadyOptions::default(),
    );

    let (_, response) = ready(&handler).await;

    assert_eq!(response.checks.len(), 4);
    for check in &response.checks {
        assert!(!check.duration.is_empty(), "{}", check.name);
        assert!(parse_duration(&check.duration).is_some(), "{}", check.duration);
    }
}

#[tokio::test]
async fn test_ready_json_shape() {
    let handler = handler(
        vec![
            ScriptedChecker::ok("db").shared(),
            ScriptedChecker::failing("redis", "connection refused").shared(),
        ],
        ReadyOptions::default(),
    );

    let response = get(&handler, "/health/ready").await;
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(value["status"], "error");
    assert_eq!(value["version"], "1.2.3");
    assert_eq!(value["environment"], "eu-central-1-dev");
    assert_eq!(value["checks"][0]["name"], "db");
    assert_eq!(value["checks"][0]["status"], "ok");
    assert!(value["checks"][0].get("message").is_none());
    assert_eq!(value["checks"][1]["message"], "connection refused");
    assert!(value["checks"][1]["duration"].is_string());
}

#[tokio::test]
async fn test_panicking_checker_is_recovered_by_middleware() {
    let service = app::build_service(&Config::default(), vec![Arc::new(PanickingChecker)], None);

    let req = Request::get("/health/ready").body(Body::empty()).unwrap();
    let response = tower::ServiceExt::oneshot(service, req).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/problem+json");
}

#[tokio::test]
async fn test_server_round_trip_and_graceful_shutdown() {
    let service = app::build_service(
        &Config::default(),
        vec![ScriptedChecker::ok("db").delayed(5).shared()],
        None,
    );
    let server = ServerBuilder::new("127.0.0.1:0".parse().unwrap())
        .with_handler(service)
        .with_shutdown_timeout(Duration::from_secs(5))
        .bind()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));

    let response = reqwest::get(format!("http://{}/health/ready", addr))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(response.headers().contains_key("traceparent"));
    let body: ReadyResponse = response.json().await.unwrap();
    assert_eq!(names(&body), ["db"]);

    stop_tx.send(()).unwrap();
    running.await.unwrap().unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_results_follow_input_order(delays in proptest::collection::vec(0u64..100, 0..8)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        let expected: Vec<String> = (0..delays.len()).map(|i| format!("check-{}", i)).collect();
        let checkers: Vec<Arc<dyn Checker>> = expected
            .iter()
            .zip(&delays)
            .map(|(name, delay)| ScriptedChecker::ok(name).delayed(*delay).shared())
            .collect();
        let handler = handler(checkers, ReadyOptions::unbounded());

        let response = runtime.block_on(handler.readiness().evaluate(&CheckContext::background()));

        prop_assert_eq!(names(&response), expected.iter().map(String::as_str).collect::<Vec<_>>());
        prop_assert_eq!(response.status, Status::Ok);
    }
}
