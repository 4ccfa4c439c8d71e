use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use gate_problem::Problem;
use workspace_auth_sdk::{WorkspaceAuthClient, WorkspaceAuthError};

use crate::middleware::request_id::XRequestId;

/// Route matcher for a specific HTTP method.
#[derive(Clone)]
pub struct RouteMatcher {
    matcher: matchit::Router<()>,
}

impl RouteMatcher {
    fn new() -> Self {
        Self {
            matcher: matchit::Router::new(),
        }
    }

    fn insert(&mut self, path: &str) -> Result<(), matchit::InsertError> {
        self.matcher.insert(path, ())
    }

    fn find(&self, path: &str) -> bool {
        self.matcher.at(path).is_ok()
    }
}

/// Whether a route requires authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequirement {
    /// No authentication required (public route).
    None,
    /// A valid access token is required.
    Required,
}

/// Gateway-specific route policy implementation
#[derive(Clone)]
pub struct GatewayRoutePolicy {
    authenticated: Arc<HashMap<Method, RouteMatcher>>,
    public: Arc<HashMap<Method, RouteMatcher>>,
    require_auth_by_default: bool,
}

impl GatewayRoutePolicy {
    pub fn new(
        authenticated: Arc<HashMap<Method, RouteMatcher>>,
        public: Arc<HashMap<Method, RouteMatcher>>,
        require_auth_by_default: bool,
    ) -> Self {
        Self {
            authenticated,
            public,
            require_auth_by_default,
        }
    }

    /// Resolve the authentication requirement for a given (method, path).
    pub fn resolve(&self, method: &Method, path: &str) -> AuthRequirement {
        let is_authenticated = self
            .authenticated
            .get(method)
            .is_some_and(|matcher| matcher.find(path));

        let is_public = self
            .public
            .get(method)
            .is_some_and(|matcher| matcher.find(path));

        // Public routes should not be forced to auth by default
        let needs_authn = is_authenticated || (self.require_auth_by_default && !is_public);

        if needs_authn {
            AuthRequirement::Required
        } else {
            AuthRequirement::None
        }
    }
}

/// Shared state for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub auth_client: Arc<dyn WorkspaceAuthClient>,
    pub route_policy: GatewayRoutePolicy,
}

fn build_matchers(
    routes: &HashSet<(Method, String)>,
) -> Result<HashMap<Method, RouteMatcher>, anyhow::Error> {
    let mut matchers: HashMap<Method, RouteMatcher> = HashMap::new();
    for (method, path) in routes {
        matchers
            .entry(method.clone())
            .or_insert_with(RouteMatcher::new)
            .insert(path)
            .map_err(|e| anyhow::anyhow!("Failed to insert route pattern '{path}': {e}"))?;
    }
    Ok(matchers)
}

/// Build a `GatewayRoutePolicy` from the registered route sets.
///
/// # Errors
/// Returns an error if a path is not a valid route pattern or is registered twice.
pub fn build_route_policy(
    cfg: &crate::config::ApiGatewayConfig,
    authenticated_routes: &HashSet<(Method, String)>,
    public_routes: &HashSet<(Method, String)>,
) -> Result<GatewayRoutePolicy, anyhow::Error> {
    Ok(GatewayRoutePolicy::new(
        Arc::new(build_matchers(authenticated_routes)?),
        Arc::new(build_matchers(public_routes)?),
        cfg.require_auth_by_default,
    ))
}

/// Bearer authentication for protected routes.
///
/// For each request:
/// 1. Skips CORS preflight requests
/// 2. Resolves the route's auth requirement via `GatewayRoutePolicy`
/// 3. For required routes: validates the bearer access token with the gate and
///    inserts the resulting `AuthenticatedPrincipal`
pub async fn authn_middleware(
    axum::extract::State(state): axum::extract::State<AuthState>,
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    if is_preflight_request(req.method(), req.headers()) {
        return next.run(req).await;
    }

    if state.route_policy.resolve(req.method(), req.uri().path()) == AuthRequirement::None {
        return next.run(req).await;
    }

    let request_id = req.extensions().get::<XRequestId>().cloned();

    let Some(token) = extract_bearer_token(req.headers()) else {
        let problem = Problem::new(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "Missing or invalid Authorization header",
        )
        .with_code("malformed_token");
        return with_request_id(problem, request_id).into_response();
    };

    match state.auth_client.validate_access_token(token).await {
        Ok(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(err) => with_request_id(auth_error_to_problem(&err), request_id).into_response(),
    }
}

fn with_request_id(problem: Problem, request_id: Option<XRequestId>) -> Problem {
    match request_id {
        Some(XRequestId(rid)) => problem.with_trace_id(rid),
        None => problem,
    }
}

fn auth_error_to_problem(err: &WorkspaceAuthError) -> Problem {
    if let WorkspaceAuthError::Internal(msg) = err {
        tracing::error!("access token validation failed: {msg}");
        return Problem::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            "Internal authentication error",
        )
        .with_code(err.code());
    }
    tracing::debug!(code = err.code(), "access token rejected");
    Problem::new(
        StatusCode::UNAUTHORIZED,
        "Unauthorized",
        "Authentication failed",
    )
    .with_code(WorkspaceAuthError::MalformedToken.code())
}

/// Extract Bearer token from Authorization header
fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Check if this is a CORS preflight request
///
/// Preflight requests are OPTIONS requests with:
/// - Origin header present
/// - Access-Control-Request-Method header present
fn is_preflight_request(method: &Method, headers: &axum::http::HeaderMap) -> bool {
    method == Method::OPTIONS
        && headers.contains_key(axum::http::header::ORIGIN)
        && headers.contains_key(axum::http::header::ACCESS_CONTROL_REQUEST_METHOD)
}
