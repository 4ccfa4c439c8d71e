//! Error types for the workspace auth module.

use std::time::Duration;

use thiserror::Error;

/// Rejections returned by the workspace auth gate.
///
/// All variants are terminal for the request. Display strings are safe to
/// log but are not meant to be shown to callers verbatim; the REST layer maps
/// them to generic denial messages plus [`WorkspaceAuthError::code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceAuthError {
    /// The email belongs to a consumer mail provider.
    #[error("personal email provider is not allowed")]
    PersonalProvider,

    /// The domain is not provisioned for the workspace identity provider.
    #[error("domain is not a workspace domain")]
    NonWorkspaceDomain,

    /// The hosted-domain claim disagrees with the email domain.
    #[error("hosted domain claim does not match email domain")]
    ClaimMismatch,

    /// The token failed verification or carries unusable claims.
    #[error("malformed or invalid token")]
    MalformedToken,

    /// The caller exhausted its rate-limit window.
    #[error("rate limit exceeded, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// A refresh token was presented after it had already been rotated.
    #[error("refresh token was already used")]
    ReplayedRefreshToken,

    /// Session credentials could not be produced.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkspaceAuthError {
    /// Stable machine-readable rejection code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PersonalProvider => "personal_provider",
            Self::NonWorkspaceDomain => "non_workspace_domain",
            Self::ClaimMismatch => "claim_mismatch",
            Self::MalformedToken => "malformed_token",
            Self::RateLimited { .. } => "rate_limited",
            Self::ReplayedRefreshToken => "replayed_refresh_token",
            Self::Internal(_) => "internal",
        }
    }
}

/// Failures of the external token verifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenVerificationError {
    #[error("token expired")]
    Expired,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("audience mismatch")]
    InvalidAudience,
    #[error("issuer not allowed")]
    InvalidIssuer,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("signing key unavailable: {0}")]
    KeyUnavailable(String),
    #[error("verification timed out")]
    Timeout,
}

/// Failures of the MX resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsLookupError {
    #[error("no MX records for domain")]
    NoRecords,
    #[error("resolution failed: {0}")]
    Resolution(String),
    #[error("lookup timed out")]
    Timeout,
}

/// Failures of the shared rate-limit and refresh-token stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
