//! Fixed response headers attached to every response, including errors
//! produced by other middleware.

use axum::Router;
use http::{HeaderName, HeaderValue, header};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::SecurityHeadersConfig;

pub const REFERRER_POLICY: &str = "strict-origin-when-cross-origin";
pub const PERMISSIONS_POLICY: &str = "geolocation=(), microphone=(), camera=()";

#[must_use]
pub fn permissions_policy() -> HeaderName {
    HeaderName::from_static("permissions-policy")
}

/// Header name/value pairs for the given configuration.
///
/// # Errors
/// Returns an error if a configured value is not a valid header value.
pub fn security_headers(
    cfg: &SecurityHeadersConfig,
) -> anyhow::Result<Vec<(HeaderName, HeaderValue)>> {
    let mut headers = vec![
        (
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
        (
            header::REFERRER_POLICY,
            HeaderValue::from_static(REFERRER_POLICY),
        ),
        (
            permissions_policy(),
            HeaderValue::from_static(PERMISSIONS_POLICY),
        ),
    ];

    if cfg.hsts_enabled {
        let value = format!("max-age={}; includeSubDomains", cfg.hsts_max_age_secs);
        headers.push((header::STRICT_TRANSPORT_SECURITY, HeaderValue::try_from(value)?));
    } else {
        tracing::warn!("Strict-Transport-Security is disabled; use only for plain-HTTP development");
    }

    Ok(headers)
}

/// Wrap `router` with one overriding header layer per security header.
///
/// # Errors
/// Returns an error if a configured value is not a valid header value.
pub fn apply(mut router: Router, cfg: &SecurityHeadersConfig) -> anyhow::Result<Router> {
    for (name, value) in security_headers(cfg)? {
        router = router.layer(SetResponseHeaderLayer::overriding(name, value));
    }
    Ok(router)
}
