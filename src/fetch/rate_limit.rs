//! Global request pacing.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

/// Spaces request grants at least `1 / calls_per_second` apart.
///
/// The last grant instant is shared by every caller and guarded by a mutex
/// that stays locked while the caller waits, so two callers can never both
/// act on a stale timestamp.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter. A non-positive rate disables throttling.
    pub fn new(calls_per_second: f64) -> Self {
        let interval = if calls_per_second > 0.0 && calls_per_second.is_finite() {
            Duration::from_secs_f64(1.0 / calls_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            interval,
            last_grant: Mutex::new(None),
        }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(0.0)
    }

    /// Minimum spacing between two grants.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next request may be issued.
    pub async fn acquire(&self) {
        let mut last_grant = self.last_grant.lock().await;
        if let Some(last) = *last_grant {
            let ready_at = last + self.interval;
            if ready_at > Instant::now() {
                sleep_until(ready_at).await;
            }
        }
        *last_grant = Some(Instant::now());
    }
}
