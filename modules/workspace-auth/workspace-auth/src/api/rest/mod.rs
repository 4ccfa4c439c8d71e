//! REST surface of the workspace auth gate.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod routes;

pub use openapi::WorkspaceAuthApiDoc;
pub use routes::{protected_routes, public_routes, router};
