use std::sync::Arc;

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Detailed health check: status plus server time.
#[allow(clippy::unused_async)] // axum handler
pub async fn health_check() -> Json<Value> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(json!({
        "status": "healthy",
        "timestamp": timestamp,
    }))
}

/// Serve a pre-built `OpenAPI` document.
pub fn openapi_json(doc: &Arc<utoipa::openapi::OpenApi>) -> Response {
    match serde_json::to_string_pretty(doc.as_ref()) {
        Ok(json) => (
            [
                (header::CONTENT_TYPE, "application/json"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            json,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize OpenAPI doc");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
