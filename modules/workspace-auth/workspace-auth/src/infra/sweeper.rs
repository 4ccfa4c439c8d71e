//! Background purge of expired in-memory state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::storage::{InMemoryRateLimitStore, InMemoryRefreshTokenStore};

/// State that accumulates expired entries.
pub trait Purgeable: Send + Sync {
    fn name(&self) -> &'static str;

    /// Remove expired entries and return how many were removed.
    fn purge_expired(&self) -> usize;
}

impl Purgeable for InMemoryRateLimitStore {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn purge_expired(&self) -> usize {
        InMemoryRateLimitStore::purge_expired(self)
    }
}

impl Purgeable for InMemoryRefreshTokenStore {
    fn name(&self) -> &'static str {
        "refresh_families"
    }

    fn purge_expired(&self) -> usize {
        InMemoryRefreshTokenStore::purge_expired(self)
    }
}

/// Purge every target each `interval` until `cancel` fires.
pub fn spawn_sweeper(
    targets: Vec<Arc<dyn Purgeable>>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    for target in &targets {
                        let purged = target.purge_expired();
                        if purged > 0 {
                            tracing::debug!(store = target.name(), purged, "purged expired entries");
                        }
                    }
                }
            }
        }
        tracing::debug!("sweeper stopped");
    })
}
