//! API Gateway definition
//!
//! Contains the `ApiGateway` struct: it collects REST registrations, applies
//! the middleware stack and serves the resulting router.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};
use workspace_auth_sdk::{RateLimitStore, WorkspaceAuthClient};

use crate::auth;
use crate::config::ApiGatewayConfig;
use crate::middleware;
use crate::web;

pub const HEALTH_PATH: &str = "/health";
pub const HEALTHZ_PATH: &str = "/healthz";
pub const OPENAPI_PATH: &str = "/openapi.json";

/// Routes and documentation contributed by one module.
pub struct RestRegistration {
    pub router: Router,
    pub public_routes: Vec<(Method, &'static str)>,
    pub authenticated_routes: Vec<(Method, &'static str)>,
    pub openapi: Option<utoipa::openapi::OpenApi>,
}

/// HTTP host: owns the merged router and the single `OpenAPI` document.
pub struct ApiGateway {
    config: ApiGatewayConfig,
    auth_client: Arc<dyn WorkspaceAuthClient>,
    rate_limit_store: Arc<dyn RateLimitStore>,
    router: Router,
    openapi: utoipa::openapi::OpenApi,
    public_routes: HashSet<(Method, String)>,
    authenticated_routes: HashSet<(Method, String)>,
}

impl ApiGateway {
    /// Create a gateway with the built-in health routes.
    ///
    /// `rate_limit_store` backs the per-user budget and is normally the same
    /// store the gate uses for its IP limits.
    #[must_use]
    pub fn new(
        config: ApiGatewayConfig,
        auth_client: Arc<dyn WorkspaceAuthClient>,
        rate_limit_store: Arc<dyn RateLimitStore>,
    ) -> Self {
        let router = Router::new()
            .route(HEALTH_PATH, get(web::health_check))
            .route(HEALTHZ_PATH, get(|| async { "ok" }));

        let public_routes = [HEALTH_PATH, HEALTHZ_PATH, OPENAPI_PATH]
            .into_iter()
            .map(|p| (Method::GET, p.to_owned()))
            .collect();

        Self {
            config,
            auth_client,
            rate_limit_store,
            router,
            openapi: utoipa::openapi::OpenApiBuilder::new().build(),
            public_routes,
            authenticated_routes: HashSet::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ApiGatewayConfig {
        &self.config
    }

    /// Merge a module's routes.
    ///
    /// # Errors
    /// Returns an error if a `(method, path)` is already registered.
    pub fn register_rest(&mut self, registration: RestRegistration) -> Result<()> {
        let RestRegistration {
            router,
            public_routes,
            authenticated_routes,
            openapi,
        } = registration;

        for (method, path) in public_routes.iter().chain(&authenticated_routes) {
            if self.is_registered(method, path) {
                tracing::error!(
                    method = %method,
                    path = %path,
                    "Duplicate (method, path) detected"
                );
                anyhow::bail!("route {method} {path} is already registered");
            }
        }

        let count = public_routes.len() + authenticated_routes.len();
        self.public_routes.extend(
            public_routes
                .into_iter()
                .map(|(m, p)| (m, p.to_owned())),
        );
        self.authenticated_routes.extend(
            authenticated_routes
                .into_iter()
                .map(|(m, p)| (m, p.to_owned())),
        );
        if let Some(doc) = openapi {
            self.openapi.merge(doc);
        }
        self.router = std::mem::take(&mut self.router).merge(router);

        tracing::debug!(operations = count, "Registered REST routes");
        Ok(())
    }

    fn is_registered(&self, method: &Method, path: &str) -> bool {
        let key = (method.clone(), path.to_owned());
        self.public_routes.contains(&key) || self.authenticated_routes.contains(&key)
    }

    /// `OpenAPI` document of every registered module with the configured metadata.
    #[must_use]
    pub fn build_openapi(&self) -> utoipa::openapi::OpenApi {
        let mut doc = self.openapi.clone();
        doc.info.title.clone_from(&self.config.openapi.title);
        doc.info.version.clone_from(&self.config.openapi.version);
        doc.info
            .description
            .clone_from(&self.config.openapi.description);
        doc
    }

    /// Apply all middleware layers to a router.
    fn apply_middleware_stack(&self, mut router: Router) -> Result<Router> {
        let route_policy = auth::build_route_policy(
            &self.config,
            &self.authenticated_routes,
            &self.public_routes,
        )?;

        tracing::info!(
            require_auth_by_default = self.config.require_auth_by_default,
            authenticated_routes = self.authenticated_routes.len(),
            public_routes = self.public_routes.len(),
            "Route policy built"
        );

        // IMPORTANT: `axum::Router::layer(...)` behaves like Tower layers: the **last** added layer
        // becomes the **outermost** layer and therefore runs **first** on the request path.
        //
        // Desired request execution order (outermost -> innermost):
        // SecurityHeaders -> SetRequestId -> PropagateRequestId -> Trace -> push_req_id_to_extensions
        // -> ClientIp -> Timeout -> BodyLimit -> CORS -> RateLimit -> Auth -> UserRateLimit -> Router
        //
        // Therefore we must add layers in the reverse order (innermost -> outermost) below.

        let config = &self.config;

        // 11) Per-user budget (inner to auth: needs the principal)
        if config.defaults.user_rate_limit.enabled {
            let limits = config.defaults.user_rate_limit;
            if limits.limit == 0 || limits.window_secs == 0 {
                anyhow::bail!("user_rate_limit needs a non-zero limit and window_secs");
            }
            let state = middleware::user_rate_limit::UserRateLimitState {
                store: Arc::clone(&self.rate_limit_store),
                limits: config.defaults.user_rate_limit,
            };
            router = router.layer(from_fn_with_state(
                state,
                middleware::user_rate_limit::user_rate_limit_middleware,
            ));
        } else {
            tracing::warn!("per-user rate limiting is disabled");
        }

        // 10) Auth
        let auth_state = auth::AuthState {
            auth_client: Arc::clone(&self.auth_client),
            route_policy,
        };
        router = router.layer(from_fn_with_state(auth_state, auth::authn_middleware));

        // 9) Per-route rate limiting & in-flight limits
        let rate_map = middleware::rate_limit::RateLimiterMap::from_routes(
            self.public_routes.iter().chain(&self.authenticated_routes),
            config.defaults.rate_limit,
        )?;
        router = router.layer(from_fn(
            move |req: axum::extract::Request, next: axum::middleware::Next| {
                let map = rate_map.clone();
                middleware::rate_limit::rate_limit_middleware(map, req, next)
            },
        ));

        // 8) CORS (must be outer to auth/limits so OPTIONS preflight short-circuits)
        if config.cors_enabled {
            router = router.layer(crate::cors::build_cors_layer(config));
        }

        // 7) Body limit
        router = router.layer(RequestBodyLimitLayer::new(config.defaults.body_limit_bytes));
        router = router.layer(DefaultBodyLimit::max(config.defaults.body_limit_bytes));

        // 6) Timeout
        router = router.layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::GATEWAY_TIMEOUT,
            config.defaults.request_timeout(),
        ));

        // 5) Client IP (outer to every limiter)
        let ip_policy = middleware::client_ip::ClientIpPolicy {
            trust_forwarded_for: config.trust_forwarded_for,
        };
        router = router.layer(from_fn(
            move |req: axum::extract::Request, next: axum::middleware::Next| {
                middleware::client_ip::client_ip_middleware(ip_policy, req, next)
            },
        ));

        // 4) Record request_id into span + extensions (requires span to exist first => must be inner to Trace)
        router = router.layer(from_fn(middleware::request_id::push_req_id_to_extensions));

        // 3) Trace
        router = router.layer({
            use tower_http::trace::TraceLayer;
            use tracing::field::Empty;

            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<axum::body::Body>| {
                    let hdr = middleware::request_id::header();
                    let rid = req
                        .headers()
                        .get(&hdr)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("n/a");

                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri().path(),
                        version = ?req.version(),
                        request_id = %rid,
                        client_ip = Empty,
                        status = Empty,
                        latency_ms = Empty,
                        "user_agent.original" = req.headers().get("user-agent")
                            .and_then(|h| h.to_str().ok())
                            .unwrap_or("unknown"),
                    )
                })
                .on_response(
                    |res: &axum::http::Response<axum::body::Body>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record("status", res.status().as_u16());
                        span.record("latency_ms", latency.as_millis());
                    },
                )
        });

        // 2) Request ID handling
        let x_request_id = middleware::request_id::header();
        // If missing, generate x-request-id first; then propagate it to the response.
        router = router.layer(PropagateRequestIdLayer::new(x_request_id.clone()));
        router = router.layer(SetRequestIdLayer::new(
            x_request_id,
            middleware::request_id::MakeReqId,
        ));

        // 1) Security headers on every response, including the ones produced above
        middleware::security_headers::apply(router, &config.security_headers)
    }

    /// Build the HTTP router from registered routes.
    ///
    /// # Errors
    /// Returns an error if the route policy or a middleware cannot be built.
    pub fn build_router(&self) -> Result<Router> {
        let mut router = self.router.clone();

        if self.config.enable_docs {
            let doc = Arc::new(self.build_openapi());
            tracing::info!(
                paths = doc.paths.paths.len(),
                "emitting OpenAPI document"
            );
            router = router.route(
                OPENAPI_PATH,
                get(move || {
                    let doc = Arc::clone(&doc);
                    async move { web::openapi_json(&doc) }
                }),
            );
        }

        self.apply_middleware_stack(router)
    }

    /// Parse bind address from configuration string.
    fn parse_bind_address(bind_addr: &str) -> Result<SocketAddr> {
        bind_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address '{bind_addr}': {e}"))
    }

    /// Bind `bind_addr` and serve until `cancel` fires.
    ///
    /// # Errors
    /// Returns an error if the address is invalid, binding fails or the server errors.
    pub async fn serve(&self, cancel: CancellationToken) -> Result<()> {
        let addr = Self::parse_bind_address(&self.config.bind_addr)?;
        let listener = TcpListener::bind(addr).await?;
        self.serve_on(listener, cancel).await
    }

    /// Serve on an already bound listener until `cancel` fires.
    ///
    /// # Errors
    /// Returns an error if the router cannot be built or the server errors.
    pub async fn serve_on(&self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let router = self.build_router()?;
        tracing::info!("HTTP server bound on {}", listener.local_addr()?);

        // Graceful shutdown on cancel
        let shutdown = async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully (cancellation)");
        };

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!(e))
    }
}
