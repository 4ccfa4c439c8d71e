use gate_problem::Problem;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::{Components, OpenApi as OpenApiDoc};
use utoipa::{Modify, OpenApi};

use super::dto::{
    ExternalAuthRequest, LogoutRequest, PrincipalResponse, RefreshRequest, SessionResponse,
};
use super::handlers;

/// OpenAPI document of the sign-in endpoints.
#[derive(OpenApi)]
#[openapi(
    info(title = "Workspace Gate API"),
    paths(handlers::authenticate, handlers::refresh, handlers::logout, handlers::me),
    components(schemas(
        ExternalAuthRequest,
        RefreshRequest,
        LogoutRequest,
        SessionResponse,
        PrincipalResponse,
        Problem
    )),
    modifiers(&BearerAuthScheme),
    tags((name = "auth", description = "Workspace-restricted sign-in and session management"))
)]
pub struct WorkspaceAuthApiDoc;

struct BearerAuthScheme;

impl Modify for BearerAuthScheme {
    fn modify(&self, openapi: &mut OpenApiDoc) {
        openapi
            .components
            .get_or_insert_with(Components::new)
            .add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
    }
}
