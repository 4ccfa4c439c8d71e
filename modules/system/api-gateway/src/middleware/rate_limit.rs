//! Per-route throughput guard: a token bucket plus an in-flight cap per
//! `(method, route)`. Protects the process, not individual clients; the
//! per-client limits live in the gate and in `user_rate_limit`.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use http::Method;
use tokio::sync::Semaphore;

use super::request_id::XRequestId;
use super::too_many_requests;
use crate::config::RateLimitDefaults;

/// Limiter state of one route.
pub struct RouteLimiter {
    bucket: DefaultDirectRateLimiter,
    clock: DefaultClock,
    in_flight: Arc<Semaphore>,
}

impl RouteLimiter {
    /// # Errors
    /// Returns an error if `rps`, `burst` or `in_flight` is zero.
    pub fn new(limits: RateLimitDefaults) -> anyhow::Result<Self> {
        let rps = NonZeroU32::new(limits.rps)
            .ok_or_else(|| anyhow::anyhow!("rate_limit.rps must be greater than zero"))?;
        let burst = NonZeroU32::new(limits.burst)
            .ok_or_else(|| anyhow::anyhow!("rate_limit.burst must be greater than zero"))?;
        if limits.in_flight == 0 {
            anyhow::bail!("rate_limit.in_flight must be greater than zero");
        }
        let in_flight = usize::try_from(limits.in_flight)?;

        Ok(Self {
            bucket: RateLimiter::direct(Quota::per_second(rps).allow_burst(burst)),
            clock: DefaultClock::default(),
            in_flight: Arc::new(Semaphore::new(in_flight)),
        })
    }

    /// Take one token; on failure return how long until the next one.
    fn try_take(&self) -> Result<(), Duration> {
        self.bucket
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}

/// Limiters keyed by `(method, route pattern)`.
#[derive(Clone, Default)]
pub struct RateLimiterMap {
    routes: Arc<HashMap<(Method, String), Arc<RouteLimiter>>>,
}

impl RateLimiterMap {
    /// One limiter with `limits` per route.
    ///
    /// # Errors
    /// Returns an error if the limits are invalid.
    pub fn from_routes<'a>(
        routes: impl IntoIterator<Item = &'a (Method, String)>,
        limits: RateLimitDefaults,
    ) -> anyhow::Result<Self> {
        let mut map = HashMap::new();
        for route in routes {
            map.insert(route.clone(), Arc::new(RouteLimiter::new(limits)?));
        }
        Ok(Self {
            routes: Arc::new(map),
        })
    }

    fn get(&self, method: &Method, path: &str) -> Option<Arc<RouteLimiter>> {
        self.routes
            .get(&(method.clone(), path.to_owned()))
            .map(Arc::clone)
    }
}

/// Reject with 429 when the route's bucket is empty or its in-flight cap is
/// reached. Unregistered paths pass through.
pub async fn rate_limit_middleware(map: RateLimiterMap, req: Request, next: Next) -> Response {
    let Some(path) = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
    else {
        return next.run(req).await;
    };

    let Some(limiter) = map.get(req.method(), &path) else {
        return next.run(req).await;
    };

    if let Err(wait) = limiter.try_take() {
        tracing::warn!(method = %req.method(), path = %path, "route rate limit exceeded");
        return too_many_requests(wait, req.extensions().get::<XRequestId>());
    }

    let Ok(_permit) = Arc::clone(&limiter.in_flight).try_acquire_owned() else {
        tracing::warn!(method = %req.method(), path = %path, "route in-flight limit reached");
        return too_many_requests(Duration::from_secs(1), req.extensions().get::<XRequestId>());
    };

    next.run(req).await
}
