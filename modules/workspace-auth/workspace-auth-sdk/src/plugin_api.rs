//! Collaborator traits the workspace auth gate composes with.
//!
//! The gate never talks to the identity provider, DNS, or shared storage
//! directly. Implementations live in `workspace_auth::infra` and tests swap
//! them for in-process doubles.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{DnsLookupError, StoreError, TokenVerificationError};
use crate::models::{
    IdentityClaims, RateLimitDecision, RateLimitKey, RefreshFamily, RotationOutcome,
    VerificationParams,
};

/// Cryptographic and structural verification of identity tokens.
#[async_trait]
pub trait IdentityTokenVerifier: Send + Sync {
    /// Verify `raw_token` against `params` and return its claims.
    ///
    /// # Errors
    ///
    /// Any signature, audience, issuer, expiry, or key-retrieval failure.
    async fn verify(
        &self,
        raw_token: &str,
        params: &VerificationParams,
    ) -> Result<IdentityClaims, TokenVerificationError>;
}

/// MX record lookup.
#[async_trait]
pub trait MxResolver: Send + Sync {
    /// Return the mail-exchange host names of `domain`.
    ///
    /// # Errors
    ///
    /// `NoRecords` when the domain has no MX records, `Resolution` otherwise.
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>, DnsLookupError>;
}

/// Atomic fixed-window counters keyed by `(scope, identifier)`.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one hit against `key` and report whether it fits in `limit` per `window`.
    ///
    /// Must be atomic per key: concurrent callers never observe lost updates.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the backing store cannot be reached.
    async fn check_and_increment(
        &self,
        key: &RateLimitKey,
        limit: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, StoreError>;
}

/// Shared storage of refresh-token families.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Register a freshly issued family.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the backing store cannot be reached.
    async fn register(&self, family: RefreshFamily) -> Result<(), StoreError>;

    /// Replace `presented_jti` by `next_jti` if and only if it is the family's current jti.
    ///
    /// The check and the update happen as one atomic step per family, so two
    /// concurrent rotations of the same token yield one `Rotated` and one `Replayed`.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the backing store cannot be reached.
    async fn rotate(
        &self,
        family_id: Uuid,
        presented_jti: Uuid,
        next_jti: Uuid,
        next_expires_at: i64,
    ) -> Result<RotationOutcome, StoreError>;

    /// Revoke a family. Returns `true` if it was active.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the backing store cannot be reached.
    async fn revoke_family(&self, family_id: Uuid) -> Result<bool, StoreError>;

    /// Whether the family exists, is not revoked, and has not expired.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the backing store cannot be reached.
    async fn is_active(&self, family_id: Uuid) -> Result<bool, StoreError>;
}
