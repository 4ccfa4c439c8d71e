#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Validates the *actual* middleware execution order of `ApiGateway::build_router`:
//! security headers -> request id -> trace -> client ip -> timeout -> body limit
//! -> CORS -> route rate limit -> auth -> user rate limit -> router

mod common;

use api_gateway::ApiGatewayConfig;
use api_gateway::config::RateLimitDefaults;
use axum::body::Body;
use http::{Request, StatusCode};
use tower::ServiceExt;

use common::{GOOD_TOKEN, app, assert_security_headers, body_json, header, protected_request};

fn strict_config() -> ApiGatewayConfig {
    let mut cfg = ApiGatewayConfig {
        cors_enabled: true,
        ..Default::default()
    };
    cfg.defaults.rate_limit = RateLimitDefaults {
        rps: 1,
        burst: 1,
        in_flight: 64,
    };
    cfg
}

#[tokio::test]
async fn real_middlewares_observe_documented_order() {
    let app = app(strict_config());

    // Req1: no bearer -> 401 from auth, but CORS, request id and security
    // headers wrap auth. The route guard sits outside auth, so Req1 already
    // consumed the only token.
    let res1 = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/auth/me/")
                .header("origin", "https://example.com")
                .header("x-request-id", "fixed-req-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res1.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(header(&res1, "x-request-id"), Some("fixed-req-1"));
    assert!(
        res1.headers().get("access-control-allow-origin").is_some(),
        "CORS header must be present on 401 => CORS wraps auth"
    );
    assert_security_headers(&res1);
    let body1 = body_json(res1).await;
    assert_eq!(body1["trace_id"], "fixed-req-1");

    // Req2: valid bearer but the bucket is empty -> 429 before auth runs.
    let res2 = app
        .clone()
        .oneshot(protected_request(Some(GOOD_TOKEN)))
        .await
        .unwrap();
    assert_eq!(res2.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(header(&res2, "retry-after").is_some());
    assert!(header(&res2, "x-request-id").is_some());
    assert_security_headers(&res2);
}

#[tokio::test]
async fn handler_sees_generated_request_id() {
    let app = app(ApiGatewayConfig::default());

    let res = app
        .oneshot(protected_request(Some(GOOD_TOKEN)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rid = header(&res, "x-request-id")
        .expect("x-request-id must be set on success")
        .to_owned();

    let body = body_json(res).await;
    assert_eq!(body["request_id"], rid.as_str());
    assert_eq!(body["email"], "alice@acme.example");
}
