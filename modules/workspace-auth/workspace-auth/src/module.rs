//! Wiring of the gate with its concrete collaborators.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use workspace_auth_sdk::{
    IdentityTokenVerifier, MxResolver, RateLimitStore, RefreshTokenStore, WorkspaceAuthClient,
};

use crate::api::rest;
use crate::config::WorkspaceAuthConfig;
use crate::domain::{Collaborators, Service, WorkspaceAuthLocalClient};
use crate::infra::{
    HickoryMxResolver, InMemoryRateLimitStore, InMemoryRefreshTokenStore, JwtIdentityVerifier,
    Purgeable, StaticMxResolver, spawn_sweeper,
};

/// The initialised workspace auth module.
pub struct WorkspaceAuthModule {
    client: Arc<dyn WorkspaceAuthClient>,
    rate_limits: Arc<InMemoryRateLimitStore>,
    refresh_store: Arc<InMemoryRefreshTokenStore>,
}

impl WorkspaceAuthModule {
    /// Build collaborators from configuration and assemble the gate.
    ///
    /// # Errors
    ///
    /// Fails when the JWKS client or the session signer cannot be created.
    pub fn init(cfg: &WorkspaceAuthConfig) -> anyhow::Result<Self> {
        let verifier: Arc<dyn IdentityTokenVerifier> = match &cfg.verifier.static_hs256_secret {
            Some(secret) => Arc::new(JwtIdentityVerifier::static_hs256(
                secret,
                cfg.verifier.clock_skew_secs,
            )),
            None => Arc::new(
                JwtIdentityVerifier::jwks(
                    cfg.verifier.jwks_url.clone(),
                    Duration::from_secs(cfg.verifier.jwks_ttl_secs),
                    cfg.verifier.timeout(),
                    cfg.verifier.clock_skew_secs,
                )
                .context("failed to create identity token verifier")?,
            ),
        };

        let mx_resolver: Arc<dyn MxResolver> = if cfg.dns.static_records.is_empty() {
            Arc::new(HickoryMxResolver::new(cfg.dns.timeout()))
        } else {
            tracing::warn!(
                domains = cfg.dns.static_records.len(),
                "MX records are served from static configuration; do NOT use in production"
            );
            Arc::new(StaticMxResolver::new(cfg.dns.static_records.clone()))
        };

        let rate_limits = Arc::new(InMemoryRateLimitStore::new());
        let refresh_store = Arc::new(InMemoryRefreshTokenStore::new());

        let service = Service::new(
            cfg,
            Collaborators {
                verifier,
                mx_resolver,
                rate_limits: Arc::clone(&rate_limits) as Arc<dyn RateLimitStore>,
                refresh_store: Arc::clone(&refresh_store) as Arc<dyn RefreshTokenStore>,
            },
        )
        .context("failed to create workspace auth service")?;

        tracing::info!(
            client_id = %cfg.client_id,
            issuers = ?cfg.issuers,
            denylist = cfg.personal_provider_domains.len(),
            workspace_mx_hosts = cfg.dns.workspace_mx_hosts.len(),
            "workspace_auth module initialized"
        );

        Ok(Self {
            client: Arc::new(WorkspaceAuthLocalClient::new(Arc::new(service))),
            rate_limits,
            refresh_store,
        })
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn WorkspaceAuthClient> {
        Arc::clone(&self.client)
    }

    /// Store shared with the gateway for user-scoped limits.
    #[must_use]
    pub fn rate_limit_store(&self) -> Arc<dyn RateLimitStore> {
        Arc::clone(&self.rate_limits) as Arc<dyn RateLimitStore>
    }

    #[must_use]
    pub fn router(&self) -> Router {
        rest::router(self.client())
    }

    /// Start purging expired rate-limit windows and refresh families.
    #[must_use]
    pub fn spawn_maintenance(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let targets: Vec<Arc<dyn Purgeable>> = vec![
            Arc::clone(&self.rate_limits) as Arc<dyn Purgeable>,
            Arc::clone(&self.refresh_store) as Arc<dyn Purgeable>,
        ];
        spawn_sweeper(targets, interval, cancel)
    }
}
