use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use workspace_auth_sdk::{AuthenticatedPrincipal, SessionCredentialPair};

// Request DTOs carry credentials and deliberately do not derive `Debug`.

/// Sign-in with an identity-provider credential.
#[derive(Clone, Deserialize, ToSchema)]
pub struct ExternalAuthRequest {
    /// Identity token (JWT) issued by the identity provider.
    pub credential: String,
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Session credentials.
#[derive(Clone, Serialize, ToSchema)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `Bearer`.
    pub token_type: String,
    /// Access-token lifetime in seconds.
    pub expires_in: u64,
    /// Refresh-token lifetime in seconds.
    pub refresh_expires_in: u64,
}

impl From<SessionCredentialPair> for SessionResponse {
    fn from(pair: SessionCredentialPair) -> Self {
        Self {
            access_token: pair.access_token.expose_secret().to_owned(),
            refresh_token: pair.refresh_token.expose_secret().to_owned(),
            token_type: "Bearer".to_owned(),
            expires_in: pair.access_expires_in.as_secs(),
            refresh_expires_in: pair.refresh_expires_in.as_secs(),
        }
    }
}

/// The signed-in principal.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrincipalResponse {
    pub email: String,
    pub domain: String,
    pub session_id: Uuid,
    /// Access-token expiry, unix seconds.
    pub expires_at: i64,
}

impl From<AuthenticatedPrincipal> for PrincipalResponse {
    fn from(p: AuthenticatedPrincipal) -> Self {
        Self {
            email: p.email,
            domain: p.domain,
            session_id: p.session_id,
            expires_at: p.expires_at,
        }
    }
}
