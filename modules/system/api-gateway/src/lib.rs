//! HTTP host of the workspace gate.
//!
//! Merges module routers, enforces bearer authentication on protected routes,
//! applies rate limits and security headers, and serves with graceful
//! shutdown.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod auth;
pub mod config;
pub mod cors;
pub mod middleware;
pub mod module;
pub mod web;

pub use config::ApiGatewayConfig;
pub use module::{ApiGateway, RestRegistration};
