//! Minimum spacing between outbound provider calls.
//! One instance is shared by every language pair, so bursts are throttled in
//! aggregate.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::trace;

pub struct RateLimiter {
    last_dispatch: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_dispatch: Mutex::new(None),
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next outbound call is allowed, then claim the slot.
    /// The lock is held across the sleep so concurrent callers are served in
    /// arrival order, each spaced by `min_interval`.
    pub async fn await_slot(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                trace!(wait_ms = wait.as_millis() as u64, "rate limiter waiting");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}
