//! Wiring of the gate, its collaborators and the gateway.

use anyhow::Context;
use api_gateway::{ApiGateway, RestRegistration};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use utoipa::OpenApi;
use workspace_auth::WorkspaceAuthModule;
use workspace_auth::api::rest;

use crate::config::{AppConfig, MaintenanceConfig};

/// Fully wired application.
pub struct GateApp {
    gateway: ApiGateway,
    auth: WorkspaceAuthModule,
    maintenance: MaintenanceConfig,
}

impl GateApp {
    /// Initialise the gate and register its routes with the gateway.
    ///
    /// # Errors
    /// Returns an error if a collaborator cannot be created or a route is
    /// registered twice.
    pub fn build(config: AppConfig) -> anyhow::Result<Self> {
        let AppConfig {
            gateway: gateway_cfg,
            workspace_auth,
            maintenance,
            ..
        } = config;

        let auth = WorkspaceAuthModule::init(&workspace_auth)
            .context("failed to initialise workspace_auth")?;

        let mut gateway = ApiGateway::new(gateway_cfg, auth.client(), auth.rate_limit_store());
        gateway.register_rest(RestRegistration {
            router: auth.router(),
            public_routes: rest::public_routes(),
            authenticated_routes: rest::protected_routes(),
            openapi: Some(rest::WorkspaceAuthApiDoc::openapi()),
        })?;

        Ok(Self {
            gateway,
            auth,
            maintenance,
        })
    }

    /// The HTTP router with the full middleware stack.
    ///
    /// # Errors
    /// Returns an error if the middleware stack cannot be built.
    pub fn router(&self) -> anyhow::Result<Router> {
        self.gateway.build_router()
    }

    /// Bind the configured address and serve until `cancel` fires.
    ///
    /// # Errors
    /// Returns an error if binding fails or the server stops with an error.
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        let sweeper = self.spawn_sweeper(&cancel);
        let served = self.gateway.serve(cancel.clone()).await;
        stop_sweeper(sweeper, &cancel).await;
        served
    }

    /// Serve on an already bound listener until `cancel` fires.
    ///
    /// # Errors
    /// Returns an error if the server stops with an error.
    pub async fn run_on(self, listener: TcpListener, cancel: CancellationToken) -> anyhow::Result<()> {
        let sweeper = self.spawn_sweeper(&cancel);
        let served = self.gateway.serve_on(listener, cancel.clone()).await;
        stop_sweeper(sweeper, &cancel).await;
        served
    }

    fn spawn_sweeper(&self, cancel: &CancellationToken) -> JoinHandle<()> {
        self.auth
            .spawn_maintenance(self.maintenance.sweep_interval(), cancel.child_token())
    }
}

/// The sweeper outlives a failed server otherwise.
async fn stop_sweeper(sweeper: JoinHandle<()>, cancel: &CancellationToken) {
    cancel.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "maintenance task ended abnormally");
    }
}
