#![allow(clippy::unwrap_used, clippy::expect_used)]

//! The fixed security headers are present on every response, whichever
//! layer produced it.

mod common;

use api_gateway::ApiGatewayConfig;
use api_gateway::config::SecurityHeadersConfig;
use axum::body::Body;
use http::{Request, StatusCode};
use tower::ServiceExt;

use common::{GOOD_TOKEN, app, assert_security_headers, header, protected_request, public_request};

#[tokio::test]
async fn success_responses_carry_headers() {
    let app = app(ApiGatewayConfig::default());

    let res = app.clone().oneshot(public_request()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_security_headers(&res);

    let res = app
        .oneshot(protected_request(Some(GOOD_TOKEN)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_security_headers(&res);
}

#[tokio::test]
async fn error_responses_carry_headers() {
    let app = app(ApiGatewayConfig::default());

    let res = app.clone().oneshot(protected_request(None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_security_headers(&res);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/missing")
                .header("authorization", format!("Bearer {GOOD_TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_security_headers(&res);
}

#[tokio::test]
async fn hsts_follows_configuration() {
    let cfg = ApiGatewayConfig {
        security_headers: SecurityHeadersConfig {
            hsts_enabled: true,
            hsts_max_age_secs: 86_400,
        },
        ..Default::default()
    };
    let res = app(cfg).oneshot(public_request()).await.unwrap();
    assert_eq!(
        header(&res, "strict-transport-security"),
        Some("max-age=86400; includeSubDomains")
    );

    let cfg = ApiGatewayConfig {
        security_headers: SecurityHeadersConfig {
            hsts_enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let res = app(cfg).oneshot(public_request()).await.unwrap();
    assert!(res.headers().get("strict-transport-security").is_none());
    assert_eq!(header(&res, "x-frame-options"), Some("DENY"));
}
