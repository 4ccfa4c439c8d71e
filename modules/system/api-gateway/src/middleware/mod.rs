//! Gateway middleware, listed in request execution order (outermost first).

pub mod client_ip;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod user_rate_limit;

use std::time::Duration;

use axum::response::{IntoResponse, Response};
use gate_problem::Problem;
use http::StatusCode;

use request_id::XRequestId;

/// Whole seconds a client should wait, never less than one.
pub(crate) fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// 429 problem shared by the route guard and the per-user budget.
pub(crate) fn too_many_requests(retry_after: Duration, request_id: Option<&XRequestId>) -> Response {
    let mut problem = Problem::new(
        StatusCode::TOO_MANY_REQUESTS,
        "Too Many Requests",
        "Rate limit exceeded. Try again later.",
    )
    .with_code("rate_limited")
    .with_retry_after(retry_after_secs(retry_after));
    if let Some(XRequestId(rid)) = request_id {
        problem = problem.with_trace_id(rid.clone());
    }
    problem.into_response()
}
