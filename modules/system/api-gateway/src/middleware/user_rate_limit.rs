use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use workspace_auth_sdk::{AuthenticatedPrincipal, RateLimitDecision, RateLimitKey, RateLimitStore};

use super::request_id::XRequestId;
use super::too_many_requests;
use crate::config::UserRateLimit;

#[derive(Clone)]
pub struct UserRateLimitState {
    pub store: Arc<dyn RateLimitStore>,
    pub limits: UserRateLimit,
}

/// Count requests of authenticated principals against `(user, email)`.
///
/// Runs inside bearer authentication; requests without a principal pass
/// through. A store failure denies the request for one full window.
pub async fn user_rate_limit_middleware(
    State(state): State<UserRateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let Some((key, domain)) = req
        .extensions()
        .get::<AuthenticatedPrincipal>()
        .map(|p| (RateLimitKey::user(&p.email), p.domain.clone()))
    else {
        return next.run(req).await;
    };

    let window = state.limits.window();

    let retry_after = match state
        .store
        .check_and_increment(&key, state.limits.limit, window)
        .await
    {
        Ok(RateLimitDecision::Allowed { .. }) => return next.run(req).await,
        Ok(RateLimitDecision::Denied { retry_after }) => {
            tracing::warn!(domain = %domain, "user rate limit exceeded");
            retry_after
        }
        Err(err) => {
            tracing::error!(error = %err, "rate-limit store failed; denying request");
            window
        }
    };

    too_many_requests(retry_after, req.extensions().get::<XRequestId>())
}
