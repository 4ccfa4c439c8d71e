#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for request body size limits and compatibility with CORS

mod common;

use api_gateway::ApiGatewayConfig;
use axum::body::Body;
use http::{Request, StatusCode};
use tower::ServiceExt;

use common::{PUBLIC_PATH, app, assert_security_headers};

fn limited(limit: usize) -> ApiGatewayConfig {
    let mut cfg = ApiGatewayConfig {
        cors_enabled: true,
        ..Default::default()
    };
    cfg.defaults.body_limit_bytes = limit;
    cfg
}

fn post_with_len(len: usize) -> Request<Body> {
    let body = format!(r#"{{"credential":"{}"}}"#, "x".repeat(len));
    Request::builder()
        .method("POST")
        .uri(PUBLIC_PATH)
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .header("origin", "https://app.example")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let res = app(limited(1024))
        .oneshot(post_with_len(4096))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(
        res.headers().get("access-control-allow-origin").is_some(),
        "body limit runs inside CORS"
    );
    assert_security_headers(&res);
}

#[tokio::test]
async fn body_within_limit_passes() {
    let res = app(limited(1024)).oneshot(post_with_len(100)).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}
