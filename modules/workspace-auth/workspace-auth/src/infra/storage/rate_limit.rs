//! In-memory fixed-window rate-limit store.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use workspace_auth_sdk::{RateLimitDecision, RateLimitKey, RateLimitStore, StoreError};

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    started: Instant,
    window: Duration,
    count: u32,
}

impl WindowCounter {
    fn ends(&self) -> Instant {
        self.started + self.window
    }
}

/// Counters live in a sharded map; the shard lock held by `entry()` makes
/// check-and-increment atomic per key.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    counters: DashMap<RateLimitKey, WindowCounter>,
}

impl InMemoryRateLimitStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop counters whose window has ended. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, c| c.ends() > now);
        before.saturating_sub(self.counters.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn check_and_increment(
        &self,
        key: &RateLimitKey,
        limit: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, StoreError> {
        let now = Instant::now();
        let mut entry = self
            .counters
            .entry(key.clone())
            .or_insert(WindowCounter {
                started: now,
                window,
                count: 0,
            });
        let counter = entry.value_mut();

        if counter.ends() <= now {
            *counter = WindowCounter {
                started: now,
                window,
                count: 0,
            };
        }

        if counter.count >= limit {
            return Ok(RateLimitDecision::Denied {
                retry_after: counter.ends().saturating_duration_since(now),
            });
        }

        counter.count += 1;
        Ok(RateLimitDecision::Allowed {
            remaining: limit - counter.count,
        })
    }
}
