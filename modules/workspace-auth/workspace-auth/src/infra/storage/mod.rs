//! In-memory implementations of the shared stores.

pub mod rate_limit;
pub mod refresh;

pub use rate_limit::InMemoryRateLimitStore;
pub use refresh::InMemoryRefreshTokenStore;
