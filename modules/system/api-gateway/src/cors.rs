use std::time::Duration;

use http::{HeaderName, Method};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::config::{ApiGatewayConfig, CorsConfig};

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v == "*")
}

/// Build the CORS layer from `cors` (or its defaults when absent).
///
/// Unparseable origins, methods and headers are skipped with a warning.
/// Credentials cannot be combined with wildcards and are dropped in that case.
#[must_use]
pub fn build_cors_layer(cfg: &ApiGatewayConfig) -> CorsLayer {
    let cors = cfg.cors.clone().unwrap_or_default();
    layer_from(&cors)
}

fn layer_from(cors: &CorsConfig) -> CorsLayer {
    let any_origin = is_wildcard(&cors.allowed_origins);
    let any_header = is_wildcard(&cors.allowed_headers);

    let origins = if any_origin {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(cors.allowed_origins.iter().filter_map(|o| {
            o.parse()
                .inspect_err(|_| tracing::warn!(origin = %o, "ignoring invalid CORS origin"))
                .ok()
        }))
    };

    let methods: Vec<Method> = cors
        .allowed_methods
        .iter()
        .filter_map(|m| {
            Method::from_bytes(m.as_bytes())
                .inspect_err(|_| tracing::warn!(method = %m, "ignoring invalid CORS method"))
                .ok()
        })
        .collect();

    let headers = if any_header {
        AllowHeaders::any()
    } else {
        AllowHeaders::list(cors.allowed_headers.iter().filter_map(|h| {
            h.parse::<HeaderName>()
                .inspect_err(|_| tracing::warn!(header = %h, "ignoring invalid CORS header"))
                .ok()
        }))
    };

    let mut layer = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .max_age(Duration::from_secs(cors.max_age_seconds));

    if cors.allow_credentials {
        if any_origin || any_header {
            tracing::warn!("CORS credentials cannot be combined with wildcard origins or headers; disabled");
        } else {
            layer = layer.allow_credentials(true);
        }
    }

    layer
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn wildcard_detection() {
        assert!(is_wildcard(&["*".to_owned()]));
        assert!(is_wildcard(&["https://a.example".to_owned(), "*".to_owned()]));
        assert!(!is_wildcard(&["https://a.example".to_owned()]));
    }

    #[test]
    fn credentials_with_wildcard_are_dropped() {
        let cors = CorsConfig {
            allow_credentials: true,
            ..Default::default()
        };
        let echo = tower::service_fn(|_req: http::Request<()>| async {
            Ok::<_, std::convert::Infallible>(http::Response::new(()))
        });

        // tower-http validates the rule set when the layer wraps a service.
        let _svc = tower::Layer::layer(&layer_from(&cors), echo);
    }
}
