//! Bounded retry for remote storage calls.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delays between attempts: doubling from twice `base_delay`, capped at
    /// `max_delay`, with jitter.
    fn delays(&self) -> impl Iterator<Item = Duration> {
        let base_ms = self.base_delay.as_millis().max(1) as u64;
        ExponentialBackoff::from_millis(2)
            .factor(base_ms)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_attempts.saturating_sub(1))
    }
}

/// Run `action`, retrying while it fails with a transient storage error.
/// Any other error is returned on the spot.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    action: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    RetryIf::spawn(policy.delays(), action, |e: &Error| {
        let transient = e.is_transient();
        if transient {
            warn!("{} failed: {}. Will retry...", operation, e);
        }
        transient
    })
    .await
    .map_err(|e| {
        if e.is_transient() {
            error!(
                "{} failed after {} attempts: {}",
                operation, policy.max_attempts, e
            );
        }
        e
    })
}
