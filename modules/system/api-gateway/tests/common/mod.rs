#![allow(dead_code)]

//! Shared fixtures: a scripted gate client, in-process rate-limit stores and
//! a small module router with one public and one protected route.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_gateway::{ApiGateway, ApiGatewayConfig, RestRegistration};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Extension;
use axum::routing::{get, post};
use axum::{Json, Router};
use http::{Method, Request, Response};
use serde_json::{Value, json};
use uuid::Uuid;
use workspace_auth_sdk::{
    AuthenticatedPrincipal, ClientIp, RateLimitDecision, RateLimitKey, RateLimitStore,
    SessionCredentialPair, StoreError, WorkspaceAuthClient, WorkspaceAuthError,
};

pub const GOOD_TOKEN: &str = "good-token";
pub const OTHER_USER_TOKEN: &str = "other-user-token";
pub const BROKEN_TOKEN: &str = "broken-token";
pub const PUBLIC_PATH: &str = "/auth/external/";
pub const PROTECTED_PATH: &str = "/auth/me/";

/// Accepts two fixed access tokens; everything else is malformed.
pub struct ScriptedAuthClient;

#[async_trait]
impl WorkspaceAuthClient for ScriptedAuthClient {
    async fn authenticate(
        &self,
        _credential: &str,
        _client_ip: ClientIp,
    ) -> Result<SessionCredentialPair, WorkspaceAuthError> {
        Err(WorkspaceAuthError::MalformedToken)
    }

    async fn refresh(
        &self,
        _refresh_token: &str,
        _client_ip: ClientIp,
    ) -> Result<SessionCredentialPair, WorkspaceAuthError> {
        Err(WorkspaceAuthError::MalformedToken)
    }

    async fn logout(&self, _refresh_token: &str, _client_ip: ClientIp) -> Result<(), WorkspaceAuthError> {
        Ok(())
    }

    async fn validate_access_token(
        &self,
        access_token: &str,
    ) -> Result<AuthenticatedPrincipal, WorkspaceAuthError> {
        let email = match access_token {
            GOOD_TOKEN => "alice@acme.example",
            OTHER_USER_TOKEN => "bob@acme.example",
            BROKEN_TOKEN => return Err(WorkspaceAuthError::Internal("store down".to_owned())),
            _ => return Err(WorkspaceAuthError::MalformedToken),
        };
        Ok(AuthenticatedPrincipal {
            email: email.to_owned(),
            domain: "acme.example".to_owned(),
            session_id: Uuid::nil(),
            expires_at: 4_102_444_800,
        })
    }
}

/// Plain counter per key; denies once `limit` is exceeded.
#[derive(Default)]
pub struct CountingStore {
    counts: Mutex<HashMap<RateLimitKey, u32>>,
}

impl CountingStore {
    pub fn count(&self, key: &RateLimitKey) -> u32 {
        self.counts.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl RateLimitStore for CountingStore {
    async fn check_and_increment(
        &self,
        key: &RateLimitKey,
        limit: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, StoreError> {
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(key.clone()).or_insert(0);
        *count += 1;
        if *count > limit {
            Ok(RateLimitDecision::Denied {
                retry_after: window,
            })
        } else {
            Ok(RateLimitDecision::Allowed {
                remaining: limit - *count,
            })
        }
    }
}

pub struct UnavailableStore;

#[async_trait]
impl RateLimitStore for UnavailableStore {
    async fn check_and_increment(
        &self,
        _key: &RateLimitKey,
        _limit: u32,
        _window: Duration,
    ) -> Result<RateLimitDecision, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_owned()))
    }
}

async fn public_handler(Extension(ClientIp(ip)): Extension<ClientIp>) -> Json<Value> {
    Json(json!({ "client_ip": ip.to_string() }))
}

async fn protected_handler(
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Extension(api_gateway::middleware::request_id::XRequestId(rid)): Extension<
        api_gateway::middleware::request_id::XRequestId,
    >,
) -> Json<Value> {
    Json(json!({ "email": principal.email, "request_id": rid }))
}

pub fn test_module() -> RestRegistration {
    RestRegistration {
        router: Router::new()
            .route(PUBLIC_PATH, post(public_handler))
            .route(PROTECTED_PATH, get(protected_handler)),
        public_routes: vec![(Method::POST, PUBLIC_PATH)],
        authenticated_routes: vec![(Method::GET, PROTECTED_PATH)],
        openapi: None,
    }
}

pub fn gateway_with_store(config: ApiGatewayConfig, store: Arc<dyn RateLimitStore>) -> ApiGateway {
    let mut gateway = ApiGateway::new(config, Arc::new(ScriptedAuthClient), store);
    gateway.register_rest(test_module()).unwrap();
    gateway
}

pub fn app_with_store(config: ApiGatewayConfig, store: Arc<dyn RateLimitStore>) -> Router {
    gateway_with_store(config, store).build_router().unwrap()
}

pub fn app(config: ApiGatewayConfig) -> Router {
    app_with_store(config, Arc::new(CountingStore::default()))
}

pub fn public_request() -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(PUBLIC_PATH)
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap()
}

pub fn protected_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(PROTECTED_PATH);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(res: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn header<'a>(res: &'a Response<Body>, name: &str) -> Option<&'a str> {
    res.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Every response must carry the fixed security headers.
pub fn assert_security_headers(res: &Response<Body>) {
    assert_eq!(header(res, "x-content-type-options"), Some("nosniff"));
    assert_eq!(header(res, "x-frame-options"), Some("DENY"));
    assert_eq!(
        header(res, "referrer-policy"),
        Some("strict-origin-when-cross-origin")
    );
    assert_eq!(
        header(res, "permissions-policy"),
        Some("geolocation=(), microphone=(), camera=()")
    );
    assert_eq!(
        header(res, "strict-transport-security"),
        Some("max-age=31536000; includeSubDomains")
    );
}
