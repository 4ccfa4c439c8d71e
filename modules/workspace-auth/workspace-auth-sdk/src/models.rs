//! Domain models for the workspace auth module.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use secrecy::SecretString;
use uuid::Uuid;

use crate::error::WorkspaceAuthError;

/// Claims consumed from a verified identity token.
///
/// Produced by an [`crate::IdentityTokenVerifier`] only after signature,
/// audience, issuer and expiry checks passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub issuer: String,
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
    /// Hosted-domain (`hd`) claim. `None` when absent or empty.
    pub hosted_domain: Option<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Constraints the verifier must enforce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationParams {
    /// This application's OAuth client id.
    pub audience: String,
    /// Accepted `iss` values.
    pub issuers: Vec<String>,
}

/// Outcome of evaluating an identity assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EligibilityDecision {
    Accepted { email: String, domain: String },
    RejectedPersonalProvider,
    RejectedNonWorkspaceDomain,
    RejectedClaimMismatch,
    RejectedMalformedToken,
}

impl EligibilityDecision {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::RejectedPersonalProvider => "personal_provider",
            Self::RejectedNonWorkspaceDomain => "non_workspace_domain",
            Self::RejectedClaimMismatch => "claim_mismatch",
            Self::RejectedMalformedToken => "malformed_token",
        }
    }

    /// The rejection this decision maps to, `None` when accepted.
    #[must_use]
    pub fn rejection(&self) -> Option<WorkspaceAuthError> {
        match self {
            Self::Accepted { .. } => None,
            Self::RejectedPersonalProvider => Some(WorkspaceAuthError::PersonalProvider),
            Self::RejectedNonWorkspaceDomain => Some(WorkspaceAuthError::NonWorkspaceDomain),
            Self::RejectedClaimMismatch => Some(WorkspaceAuthError::ClaimMismatch),
            Self::RejectedMalformedToken => Some(WorkspaceAuthError::MalformedToken),
        }
    }
}

/// Access/refresh token pair handed to a signed-in client.
///
/// Token strings are wrapped in `SecretString` so `Debug` redacts them.
#[derive(Debug, Clone)]
pub struct SessionCredentialPair {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub access_expires_in: Duration,
    pub refresh_expires_in: Duration,
}

/// Rate-limit scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitScope {
    Ip,
    User,
}

impl RateLimitScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::User => "user",
        }
    }
}

/// Composite key of a rate-limit counter.
///
/// `bucket` separates budgets of one identifier, e.g. sign-in and refresh
/// attempts of the same IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub scope: RateLimitScope,
    pub bucket: &'static str,
    pub identifier: String,
}

impl RateLimitKey {
    /// Bucket of the gateway's per-user request budget.
    pub const USER_REQUESTS: &'static str = "requests";

    #[must_use]
    pub fn ip(bucket: &'static str, ip: IpAddr) -> Self {
        Self {
            scope: RateLimitScope::Ip,
            bucket,
            identifier: ip.to_string(),
        }
    }

    #[must_use]
    pub fn user(user_id: &str) -> Self {
        Self {
            scope: RateLimitScope::User,
            bucket: Self::USER_REQUESTS,
            identifier: user_id.to_owned(),
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.scope.as_str(), self.bucket, self.identifier)
    }
}

/// Result of a `check_and_increment` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Denied { retry_after: Duration },
}

/// Rotation state of one refresh-token family (one sign-in session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFamily {
    pub family_id: Uuid,
    pub subject: String,
    /// `jti` of the only refresh token of this family that may still be exchanged.
    pub current_jti: Uuid,
    pub generation: u32,
    /// Unix seconds after which the family is dead.
    pub expires_at: i64,
}

/// Result of a conditional refresh rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// The presented token was current; the family now points to the new jti.
    Rotated { generation: u32 },
    /// The presented token belongs to the family but was already rotated.
    Replayed,
    /// The family does not exist, was revoked, or expired.
    Unknown,
}

/// Identity carried by a valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    pub email: String,
    pub domain: String,
    pub session_id: Uuid,
    pub expires_at: i64,
}

/// Resolved client address of the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientIp(pub IpAddr);

impl fmt::Display for ClientIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
