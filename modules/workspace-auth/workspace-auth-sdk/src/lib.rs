//! Workspace Auth SDK
//!
//! This crate provides the public API for the `workspace_auth` module:
//!
//! - [`WorkspaceAuthClient`] - Public API trait for consumers (the API gateway)
//! - [`IdentityTokenVerifier`], [`MxResolver`], [`RateLimitStore`],
//!   [`RefreshTokenStore`] - Collaborator traits the gate composes with
//! - [`SessionCredentialPair`], [`EligibilityDecision`], [`RateLimitKey`] - Models
//! - [`WorkspaceAuthError`] - Rejection taxonomy
//!
//! ## Usage
//!
//! ```ignore
//! use workspace_auth_sdk::{ClientIp, WorkspaceAuthClient};
//!
//! let pair = client.authenticate(credential, ClientIp(peer_ip)).await?;
//! let access = pair.access_token;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod models;
pub mod plugin_api;

// Re-export main types at crate root
pub use api::WorkspaceAuthClient;
pub use error::{DnsLookupError, StoreError, TokenVerificationError, WorkspaceAuthError};
pub use models::{
    AuthenticatedPrincipal, ClientIp, EligibilityDecision, IdentityClaims, RateLimitDecision,
    RateLimitKey, RateLimitScope, RefreshFamily, RotationOutcome, SessionCredentialPair,
    VerificationParams,
};
pub use plugin_api::{IdentityTokenVerifier, MxResolver, RateLimitStore, RefreshTokenStore};
