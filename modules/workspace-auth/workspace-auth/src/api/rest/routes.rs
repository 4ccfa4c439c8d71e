use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};
use http::Method;
use workspace_auth_sdk::WorkspaceAuthClient;

use super::handlers;

pub const AUTHENTICATE_PATH: &str = "/auth/external/";
pub const REFRESH_PATH: &str = "/auth/refresh/";
pub const LOGOUT_PATH: &str = "/auth/logout/";
pub const ME_PATH: &str = "/auth/me/";

/// Routes of the gate. Handlers expect a `ClientIp` extension on every
/// request and an `AuthenticatedPrincipal` on protected ones; the API
/// gateway middleware provides both.
pub fn router(client: Arc<dyn WorkspaceAuthClient>) -> Router {
    Router::new()
        .route(AUTHENTICATE_PATH, post(handlers::authenticate))
        .route(REFRESH_PATH, post(handlers::refresh))
        .route(LOGOUT_PATH, post(handlers::logout))
        .route(ME_PATH, get(handlers::me))
        .layer(Extension(client))
}

/// Routes reachable without a bearer token.
#[must_use]
pub fn public_routes() -> Vec<(Method, &'static str)> {
    vec![
        (Method::POST, AUTHENTICATE_PATH),
        (Method::POST, REFRESH_PATH),
        (Method::POST, LOGOUT_PATH),
    ]
}

/// Routes that require a valid access token.
#[must_use]
pub fn protected_routes() -> Vec<(Method, &'static str)> {
    vec![(Method::GET, ME_PATH)]
}
