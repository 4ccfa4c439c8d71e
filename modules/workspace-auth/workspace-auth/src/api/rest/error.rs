use axum::extract::rejection::JsonRejection;
use gate_problem::Problem;
use http::StatusCode;
use workspace_auth_sdk::WorkspaceAuthError;

/// Convert gate rejections to HTTP Problem responses.
///
/// Details stay generic; the `code` field carries the category.
#[allow(clippy::needless_pass_by_value)] // used as a `map_err` adapter
pub fn auth_error_to_problem(err: WorkspaceAuthError) -> Problem {
    let code = err.code();
    match err {
        WorkspaceAuthError::PersonalProvider
        | WorkspaceAuthError::NonWorkspaceDomain
        | WorkspaceAuthError::ClaimMismatch => Problem::new(
            StatusCode::FORBIDDEN,
            "Forbidden",
            "This account is not allowed to sign in.",
        )
        .with_code(code),

        WorkspaceAuthError::MalformedToken | WorkspaceAuthError::ReplayedRefreshToken => {
            Problem::new(
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                "The provided credential is invalid.",
            )
            .with_code(code)
        }

        WorkspaceAuthError::RateLimited { retry_after } => {
            let secs = retry_after_secs(retry_after);
            Problem::new(
                StatusCode::TOO_MANY_REQUESTS,
                "Too Many Requests",
                "Rate limit exceeded. Try again later.",
            )
            .with_code(code)
            .with_retry_after(secs)
        }

        WorkspaceAuthError::Internal(_) => Problem::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            "The request could not be completed.",
        )
        .with_code(code),
    }
}

/// 400 for request bodies that are not the expected JSON.
pub fn invalid_request(detail: impl Into<String>) -> Problem {
    Problem::new(StatusCode::BAD_REQUEST, "Bad Request", detail).with_code("invalid_request")
}

/// 413 stays 413 (body limit hit while buffering); any other body problem is 400.
pub fn json_rejection_to_problem(rejection: &JsonRejection) -> Problem {
    tracing::debug!(error = %rejection.body_text(), "rejected request body");
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return Problem::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Payload Too Large",
            "Request body is too large.",
        )
        .with_code("payload_too_large");
    }
    invalid_request("Request body must be a JSON object with the documented fields.")
}

/// Whole seconds, rounded up and at least one.
fn retry_after_secs(d: std::time::Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}
