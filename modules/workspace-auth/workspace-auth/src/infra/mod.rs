//! Infrastructure: concrete collaborators of the gate.

pub mod dns;
pub mod storage;
pub mod sweeper;
pub mod verifier;

pub use dns::{HickoryMxResolver, StaticMxResolver};
pub use storage::{InMemoryRateLimitStore, InMemoryRefreshTokenStore};
pub use sweeper::{Purgeable, spawn_sweeper};
pub use verifier::JwtIdentityVerifier;
