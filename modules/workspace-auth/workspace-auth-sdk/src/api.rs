//! Public API trait for the workspace auth gate.
//!
//! The gate implements this trait; the API gateway consumes it both for the
//! sign-in endpoints and for bearer authentication of protected routes.

use async_trait::async_trait;

use crate::error::WorkspaceAuthError;
use crate::models::{AuthenticatedPrincipal, ClientIp, SessionCredentialPair};

/// Public API trait for the workspace auth gate.
///
/// ```ignore
/// let pair = client.authenticate(credential, ClientIp(ip)).await?;
/// let principal = client.validate_access_token(pair.access_token.expose_secret()).await?;
/// ```
#[async_trait]
pub trait WorkspaceAuthClient: Send + Sync {
    /// Exchange an identity-provider token for a fresh session.
    ///
    /// The IP-scoped rate limit is checked before the token is looked at.
    ///
    /// # Errors
    ///
    /// - `RateLimited` if the client IP exhausted its window
    /// - `MalformedToken` if verification fails or `email_verified` is false
    /// - `PersonalProvider` for denylisted consumer mail domains
    /// - `ClaimMismatch` if the hosted-domain claim disagrees with the email
    /// - `NonWorkspaceDomain` if the domain's MX records are not workspace hosts
    async fn authenticate(
        &self,
        credential: &str,
        client_ip: ClientIp,
    ) -> Result<SessionCredentialPair, WorkspaceAuthError>;

    /// Rotate a refresh token into a new session pair.
    ///
    /// # Errors
    ///
    /// - `ReplayedRefreshToken` if the token was already rotated
    /// - `MalformedToken` if the token is invalid, expired, or its session revoked
    /// - `RateLimited` if the client IP exhausted its window
    async fn refresh(
        &self,
        refresh_token: &str,
        client_ip: ClientIp,
    ) -> Result<SessionCredentialPair, WorkspaceAuthError>;

    /// Revoke the session the refresh token belongs to.
    ///
    /// # Errors
    ///
    /// - `MalformedToken` if the token cannot be validated
    async fn logout(
        &self,
        refresh_token: &str,
        client_ip: ClientIp,
    ) -> Result<(), WorkspaceAuthError>;

    /// Validate an access token issued by this gate.
    ///
    /// # Errors
    ///
    /// - `MalformedToken` if the token is invalid, expired, or its session revoked
    async fn validate_access_token(
        &self,
        access_token: &str,
    ) -> Result<AuthenticatedPrincipal, WorkspaceAuthError>;
}
