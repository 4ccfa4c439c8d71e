//! Local (in-process) client for the workspace auth gate.

use std::sync::Arc;

use async_trait::async_trait;
use workspace_auth_sdk::{
    AuthenticatedPrincipal, ClientIp, SessionCredentialPair, WorkspaceAuthClient,
    WorkspaceAuthError,
};

use super::{DomainError, Service};

/// Local client wrapping the service.
///
/// Handed to the API gateway, which serves the sign-in routes and
/// authenticates bearer tokens through it.
pub struct WorkspaceAuthLocalClient {
    svc: Arc<Service>,
}

impl WorkspaceAuthLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> WorkspaceAuthError {
    match &e {
        DomainError::Session(super::session::SessionError::Signing(_)) | DomainError::Store(_) => {
            tracing::error!(operation = op, error = %e, "workspace_auth call failed");
        }
        _ => tracing::debug!(operation = op, error = %e, "workspace_auth call rejected"),
    }
    e.into()
}

#[async_trait]
impl WorkspaceAuthClient for WorkspaceAuthLocalClient {
    async fn authenticate(
        &self,
        credential: &str,
        client_ip: ClientIp,
    ) -> Result<SessionCredentialPair, WorkspaceAuthError> {
        self.svc
            .authenticate(credential, client_ip)
            .await
            .map_err(|e| log_and_convert("authenticate", e))
    }

    async fn refresh(
        &self,
        refresh_token: &str,
        client_ip: ClientIp,
    ) -> Result<SessionCredentialPair, WorkspaceAuthError> {
        self.svc
            .refresh(refresh_token, client_ip)
            .await
            .map_err(|e| log_and_convert("refresh", e))
    }

    async fn logout(
        &self,
        refresh_token: &str,
        client_ip: ClientIp,
    ) -> Result<(), WorkspaceAuthError> {
        self.svc
            .logout(refresh_token, client_ip)
            .await
            .map_err(|e| log_and_convert("logout", e))
    }

    async fn validate_access_token(
        &self,
        access_token: &str,
    ) -> Result<AuthenticatedPrincipal, WorkspaceAuthError> {
        self.svc
            .validate_access_token(access_token)
            .await
            .map_err(|e| log_and_convert("validate_access_token", e))
    }
}
