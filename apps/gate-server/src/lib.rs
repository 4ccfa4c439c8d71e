//! Workspace gate server: configuration, logging and wiring of the gate
//! behind the API gateway.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod app;
pub mod config;
pub mod logging;

pub use app::GateApp;
pub use config::AppConfig;
