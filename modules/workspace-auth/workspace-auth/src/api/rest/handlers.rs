use std::sync::Arc;

use axum::Json;
use axum::extract::Extension;
use axum::extract::rejection::JsonRejection;
use gate_problem::{ApiResult, Problem};
use http::StatusCode;
use workspace_auth_sdk::{AuthenticatedPrincipal, ClientIp, WorkspaceAuthClient};

use super::dto::{
    ExternalAuthRequest, LogoutRequest, PrincipalResponse, RefreshRequest, SessionResponse,
};
use super::error::{auth_error_to_problem, invalid_request, json_rejection_to_problem};

/// Sign in with an identity-provider credential
#[utoipa::path(
    post,
    path = "/auth/external/",
    tag = "auth",
    operation_id = "workspace_auth.authenticate",
    request_body = ExternalAuthRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 400, description = "Malformed request", body = Problem, content_type = "application/problem+json"),
        (status = 401, description = "Invalid credential", body = Problem, content_type = "application/problem+json"),
        (status = 403, description = "Account not eligible", body = Problem, content_type = "application/problem+json"),
        (status = 429, description = "Rate limited", body = Problem, content_type = "application/problem+json",
            headers(("Retry-After" = u64, description = "Seconds until the window resets"))),
    )
)]
#[tracing::instrument(skip_all, fields(client_ip = %client_ip))]
pub async fn authenticate(
    Extension(client): Extension<Arc<dyn WorkspaceAuthClient>>,
    Extension(client_ip): Extension<ClientIp>,
    body: Result<Json<ExternalAuthRequest>, JsonRejection>,
) -> ApiResult<Json<SessionResponse>> {
    let Json(req) = body.map_err(|e| json_rejection_to_problem(&e))?;
    let credential = req.credential.trim();
    if credential.is_empty() {
        return Err(invalid_request("`credential` must not be empty."));
    }

    let pair = client
        .authenticate(credential, client_ip)
        .await
        .map_err(auth_error_to_problem)?;
    Ok(Json(pair.into()))
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh/",
    tag = "auth",
    operation_id = "workspace_auth.refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Session rotated", body = SessionResponse),
        (status = 400, description = "Malformed request", body = Problem, content_type = "application/problem+json"),
        (status = 401, description = "Invalid, revoked or replayed refresh token", body = Problem, content_type = "application/problem+json"),
        (status = 429, description = "Rate limited", body = Problem, content_type = "application/problem+json",
            headers(("Retry-After" = u64, description = "Seconds until the window resets"))),
    )
)]
#[tracing::instrument(skip_all, fields(client_ip = %client_ip))]
pub async fn refresh(
    Extension(client): Extension<Arc<dyn WorkspaceAuthClient>>,
    Extension(client_ip): Extension<ClientIp>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<SessionResponse>> {
    let Json(req) = body.map_err(|e| json_rejection_to_problem(&e))?;
    if req.refresh_token.trim().is_empty() {
        return Err(invalid_request("`refresh_token` must not be empty."));
    }

    let pair = client
        .refresh(req.refresh_token.trim(), client_ip)
        .await
        .map_err(auth_error_to_problem)?;
    Ok(Json(pair.into()))
}

/// End the session a refresh token belongs to
#[utoipa::path(
    post,
    path = "/auth/logout/",
    tag = "auth",
    operation_id = "workspace_auth.logout",
    request_body = LogoutRequest,
    responses(
        (status = 204, description = "Session revoked"),
        (status = 400, description = "Malformed request", body = Problem, content_type = "application/problem+json"),
        (status = 401, description = "Invalid refresh token", body = Problem, content_type = "application/problem+json"),
    )
)]
#[tracing::instrument(skip_all, fields(client_ip = %client_ip))]
pub async fn logout(
    Extension(client): Extension<Arc<dyn WorkspaceAuthClient>>,
    Extension(client_ip): Extension<ClientIp>,
    body: Result<Json<LogoutRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = body.map_err(|e| json_rejection_to_problem(&e))?;
    if req.refresh_token.trim().is_empty() {
        return Err(invalid_request("`refresh_token` must not be empty."));
    }

    client
        .logout(req.refresh_token.trim(), client_ip)
        .await
        .map_err(auth_error_to_problem)?;
    Ok(StatusCode::NO_CONTENT)
}

/// The signed-in principal
#[utoipa::path(
    get,
    path = "/auth/me/",
    tag = "auth",
    operation_id = "workspace_auth.me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current principal", body = PrincipalResponse),
        (status = 401, description = "Missing or invalid access token", body = Problem, content_type = "application/problem+json"),
    )
)]
#[tracing::instrument(skip_all, fields(domain = %principal.domain))]
#[allow(clippy::unused_async)]
pub async fn me(Extension(principal): Extension<AuthenticatedPrincipal>) -> Json<PrincipalResponse> {
    Json(principal.into())
}
