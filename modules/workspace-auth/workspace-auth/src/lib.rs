//! Workspace Auth Module
//!
//! Accepts identity-provider tokens, admits only organizational (workspace)
//! accounts and issues rotating session credentials:
//!
//! - personal mail providers are denied without any I/O
//! - the hosted-domain claim must agree with the email domain
//! - the domain's MX records must point at workspace mail exchangers
//! - refresh tokens rotate on use; a replayed one revokes the whole session
//!
//! Provides [`workspace_auth_sdk::WorkspaceAuthClient`] for the API gateway.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod config;
pub mod domain;
pub mod infra;
pub mod module;

pub use config::WorkspaceAuthConfig;
pub use module::WorkspaceAuthModule;
