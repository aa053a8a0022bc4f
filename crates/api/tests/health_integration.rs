//! Integration tests for operational endpoints and global middleware.

mod common;

use axum::http::{Method, StatusCode};
use common::{create_test_app, empty_request, parse_response_body};

#[tokio::test]
async fn test_health_reports_memory_store() {
    let app = create_test_app();

    let response = app
        .send(empty_request(Method::GET, "/api/health", None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"]["backend"], "memory");
    assert_eq!(body["store"]["connected"], true);
    assert!(body["store"]["latency_ms"].is_u64());
}

#[tokio::test]
async fn test_probes() {
    let app = create_test_app();

    let live = app
        .send(empty_request(Method::GET, "/api/health/live", None))
        .await;
    assert_eq!(live.status(), StatusCode::OK);
    assert_eq!(parse_response_body(live).await["status"], "alive");

    let ready = app
        .send(empty_request(Method::GET, "/api/health/ready", None))
        .await;
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(parse_response_body(ready).await["status"], "ready");
}

#[tokio::test]
async fn test_responses_carry_request_id_and_security_headers() {
    let app = create_test_app();

    let request = axum::http::Request::builder()
        .uri("/api/health/live")
        .header("X-Request-ID", "trace-abc")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.send(request).await;

    let headers = response.headers();
    assert_eq!(headers["x-request-id"], "trace-abc");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.get("strict-transport-security").is_none());
}

#[tokio::test]
async fn test_errors_use_json_envelope() {
    let app = create_test_app();

    let response = app
        .send(empty_request(
            Method::GET,
            "/api/v1/public/retreats/unknown-link",
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["message"], "Retreat not found");
}
