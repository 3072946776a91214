//! Bounded retry for transiently-failing store operations.
//!
//! Reconciliation is idempotent, so the recovery strategy for optimistic-lock
//! conflicts is simply to rerun the whole operation from current state after
//! a short jittered delay. Attempts are bounded; exhaustion hands the last
//! error back to the job boundary, where it is logged and the next scheduled
//! tick starts over.

use crate::error::Transient;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry bounds for transient store contention.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per attempt after that.
    pub base_delay: Duration,
    /// Upper bound on the per-attempt delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, exponential with jitter in
    /// `[half, full]` so two racing processes do not retry in lockstep.
    fn delay_after(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay);
        let max_ms = capped.as_millis().max(1) as u64;
        let jittered = rand::thread_rng().gen_range(max_ms / 2..=max_ms);
        Duration::from_millis(jittered)
    }
}

/// Runs `op`, retrying it while it fails with a transient error, up to the
/// policy's attempt bound. Non-transient errors are returned immediately.
pub async fn retry_transient<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Transient + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                debug!(
                    "Transient failure on attempt {}/{}, retrying in {:?}: {}",
                    attempt, policy.max_attempts, delay, err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    warn!("Giving up after {} attempts: {}", policy.max_attempts, err);
                }
                return Err(err);
            }
        }
    }
}
