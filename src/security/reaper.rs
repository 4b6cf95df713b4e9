//! Background eviction of idle rate-limit buckets.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::observability::metrics;
use crate::security::rate_limit::RateLimiter;

pub struct BucketReaper {
    limiter: Arc<RateLimiter>,
    interval: Duration,
}

impl BucketReaper {
    pub fn new(limiter: Arc<RateLimiter>, interval: Duration) -> Self {
        Self { limiter, interval }
    }

    /// Run one sweep. A panic inside the sweep is logged and reported as zero evictions.
    pub fn sweep_once(&self) -> usize {
        match catch_unwind(AssertUnwindSafe(|| self.limiter.sweep())) {
            Ok(evicted) => {
                let remaining = self.limiter.tracked_clients();
                if evicted > 0 {
                    tracing::debug!(evicted, remaining, "Evicted idle rate-limit buckets");
                }
                metrics::record_reaper_sweep(evicted, remaining);
                evicted
            }
            Err(panic) => {
                tracing::error!(
                    panic = %panic_message(panic.as_ref()),
                    "Rate-limit reaper sweep panicked"
                );
                0
            }
        }
    }

    /// Sweep on a fixed interval until shutdown is signalled.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Rate-limit reaper starting");

        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate-limit reaper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
