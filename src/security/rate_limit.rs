//! Per-client token bucket rate limiting
//!
//! Buckets live in a sharded concurrent map keyed by client IP, so two
//! clients only contend when they hash to the same shard and no request
//! ever takes a global lock. Idle buckets are swept lazily.

use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Run an eviction sweep every this many checks
const SWEEP_INTERVAL: u64 = 1024;
/// Lower bound for how long an idle bucket is kept
const MIN_IDLE_TTL: Duration = Duration::from_secs(60);
/// Upper bound for computed waits and refill times
const MAX_WAIT: Duration = Duration::from_secs(86_400);

/// Result of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// Denied; `retry_after` is the wait until one token is available
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Token count and refill bookkeeping for one client
#[derive(Debug, Clone, Copy)]
struct ClientBucket {
    tokens: f64,
    last_refill: Instant,
}

impl ClientBucket {
    const fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant, rate: f64, capacity: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = elapsed.mul_add(rate, self.tokens).min(capacity);
        self.last_refill = now;
    }
}

pub struct RateLimiter {
    enabled: bool,
    rate: f64,
    capacity: f64,
    idle_ttl: Duration,
    buckets: DashMap<IpAddr, ClientBucket>,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let rate = config.requests_per_second;
        let capacity = f64::from(config.burst.max(1));
        // A bucket idle for capacity/rate seconds is full again, so dropping it
        // after that point cannot change any later decision.
        let refill_time = if rate > 0.0 {
            seconds_capped(capacity / rate)
        } else {
            Duration::ZERO
        };
        Self {
            enabled: config.enabled && rate > 0.0,
            rate,
            capacity,
            idle_ttl: refill_time.max(MIN_IDLE_TTL),
            buckets: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a request from `client` may proceed
    pub fn allow(&self, client: IpAddr) -> bool {
        self.check(client).is_allowed()
    }

    pub fn check(&self, client: IpAddr) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    /// Consume one token for `client` as of `now`
    pub fn check_at(&self, client: IpAddr, now: Instant) -> RateDecision {
        if !self.enabled {
            return RateDecision::Allowed;
        }

        let decision = {
            let mut bucket = self
                .buckets
                .entry(client)
                .or_insert_with(|| ClientBucket::full(self.capacity, now));
            bucket.refill(now, self.rate, self.capacity);

            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                RateDecision::Allowed
            } else {
                let missing = 1.0 - bucket.tokens;
                RateDecision::Limited {
                    retry_after: seconds_capped(missing / self.rate),
                }
            }
        };

        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.evict_idle(now);
        }

        decision
    }

    /// Drop buckets that have not been touched for longer than the idle TTL
    pub fn evict_idle(&self, now: Instant) {
        let ttl = self.idle_ttl;
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < ttl);
    }

    /// Number of tracked clients
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Convert fractional seconds, saturating at `MAX_WAIT` for very slow rates
fn seconds_capped(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).map_or(MAX_WAIT, |wait| wait.min(MAX_WAIT))
}

/// Whole seconds for a `Retry-After` header, never less than one
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}
