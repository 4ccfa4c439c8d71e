//! Domain errors for the workspace auth gate.

use std::time::Duration;

use uuid::Uuid;
use workspace_auth_sdk::{
    DnsLookupError, EligibilityDecision, StoreError, TokenVerificationError, WorkspaceAuthError,
};

use super::session::SessionError;
use crate::config::ConfigError;

/// Internal domain errors.
///
/// Richer than [`WorkspaceAuthError`]: the cause is kept for logs and dropped
/// at the SDK boundary.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("rejected: {}", .0.as_str())]
    Rejected(EligibilityDecision),

    #[error("identity token verification failed: {0}")]
    Verification(#[from] TokenVerificationError),

    #[error("workspace MX check failed for '{domain}': {source}")]
    MxLookup {
        domain: String,
        #[source]
        source: DnsLookupError,
    },

    #[error("email address is not verified")]
    EmailNotVerified,

    #[error("rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("refresh token of family {family_id} was replayed")]
    Replayed { family_id: Uuid },

    #[error("session family {family_id} is unknown, revoked or expired")]
    UnknownSession { family_id: Uuid },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl From<DomainError> for WorkspaceAuthError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Rejected(decision) => {
                decision.rejection().unwrap_or(Self::MalformedToken)
            }
            DomainError::MxLookup { .. } => Self::NonWorkspaceDomain,
            DomainError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            DomainError::Replayed { .. } => Self::ReplayedRefreshToken,
            DomainError::Session(SessionError::Signing(msg)) => Self::Internal(msg),
            DomainError::Session(SessionError::MissingKey | SessionError::LifetimeOutOfRange) => {
                Self::Internal("session issuer misconfigured".to_owned())
            }
            DomainError::Store(StoreError::Unavailable(msg)) => Self::Internal(msg),
            DomainError::Config(e) => Self::Internal(e.to_string()),
            DomainError::Verification(_)
            | DomainError::EmailNotVerified
            | DomainError::UnknownSession { .. }
            | DomainError::Session(SessionError::Invalid(_) | SessionError::WrongKind { .. }) => {
                Self::MalformedToken
            }
        }
    }
}
