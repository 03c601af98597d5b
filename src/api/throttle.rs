//! Minimum-interval throttle between dispatches
//!
//! Each client owns its own throttle clock. `wait` takes `&mut self`, so a
//! single throttle can never be shared between concurrent callers.

use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum interval between consecutive dispatches
#[derive(Debug, Default)]
pub struct Throttle {
    last_call: Option<Instant>,
}

impl Throttle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interval implied by a requests-per-second rate (zero for non-positive rates)
    pub fn interval_for_rate(requests_per_second: f64) -> Duration {
        if requests_per_second > 0.0 && requests_per_second.is_finite() {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::ZERO
        }
    }

    /// Time still to wait before the next dispatch may go out
    pub fn remaining(&self, min_interval: Duration) -> Duration {
        match self.last_call {
            Some(last) => min_interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Sleep until `min_interval` has passed since the previous call, then record now
    pub async fn wait(&mut self, min_interval: Duration) {
        let remaining = self.remaining(min_interval);
        if !remaining.is_zero() {
            tracing::debug!(wait_ms = remaining.as_millis() as u64, "throttle_wait");
            tokio::time::sleep(remaining).await;
        }
        self.last_call = Some(Instant::now());
    }
}
