//! Domain layer for the workspace auth gate.

pub mod audit;
pub mod eligibility;
pub mod error;
pub mod local_client;
pub mod service;
pub mod session;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod service_tests;

pub use error::DomainError;
pub use local_client::WorkspaceAuthLocalClient;
pub use service::{Collaborators, Service};
