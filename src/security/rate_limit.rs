//! Per-client token bucket rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;

use crate::config::RateLimitConfig;
use crate::security::clock::{Clock, SystemClock};

/// Allowance and timestamps for one client address.
#[derive(Debug, Clone)]
struct ClientBucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl ClientBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    fn try_acquire(&mut self, now: Instant, capacity: f64, refill_rate: f64) -> bool {
        // Time already credited is never credited twice.
        let now = now.max(self.last_refill);
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_refill = now;
        self.last_seen = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Rate limiter keyed by client address.
///
/// The bucket table is private; callers only see [`RateLimiter::admit`],
/// [`RateLimiter::sweep`] and [`RateLimiter::reconfigure`]. Each call holds
/// the table lock for constant work.
pub struct RateLimiter {
    buckets: Mutex<HashMap<IpAddr, ClientBucket>>,
    settings: ArcSwap<RateLimitConfig>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitConfig) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            settings: ArcSwap::from_pointee(settings),
            clock,
        }
    }

    // A panic while holding the lock must not take the limiter down with it;
    // bucket state is always left consistent between statements.
    fn table(&self) -> MutexGuard<'_, HashMap<IpAddr, ClientBucket>> {
        self.buckets.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide whether a request from `client` may proceed.
    pub fn admit(&self, client: IpAddr) -> bool {
        let settings = self.settings.load();
        if !settings.enabled {
            return true;
        }

        let capacity = f64::from(settings.burst_size);
        let rate = settings.requests_per_second;

        let mut buckets = self.table();
        let now = self.clock.now();
        let bucket = buckets
            .entry(client)
            .or_insert_with(|| ClientBucket::new(capacity, now));

        bucket.try_acquire(now, capacity, rate)
    }

    /// Evict buckets idle for longer than the configured window. Returns the count evicted.
    pub fn sweep(&self) -> usize {
        let idle = Duration::from_secs(self.settings.load().idle_eviction_secs);
        let now = self.clock.now();

        let mut buckets = self.table();
        let before = buckets.len();
        buckets.retain(|_, b| now.saturating_duration_since(b.last_seen) <= idle);
        before - buckets.len()
    }

    /// Replace rate, burst, enabled flag and idle window.
    pub fn reconfigure(&self, settings: RateLimitConfig) {
        tracing::info!(
            enabled = settings.enabled,
            requests_per_second = settings.requests_per_second,
            burst_size = settings.burst_size,
            "Rate limiter reconfigured"
        );
        self.settings.store(Arc::new(settings));
    }

    pub fn settings(&self) -> Arc<RateLimitConfig> {
        self.settings.load_full()
    }

    /// Number of tracked client buckets.
    pub fn tracked_clients(&self) -> usize {
        self.table().len()
    }
}
