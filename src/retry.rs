//! Polling helper shared by the lock loop and mergeability resolution

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::trace;

/// How many times to try and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum attempts; `None` polls until the operation yields a value
    pub max_attempts: Option<u32>,
    /// Wait between consecutive attempts
    pub interval: Duration,
}

impl PollPolicy {
    /// A bounded policy
    pub const fn bounded(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            interval,
        }
    }

    /// A policy that never gives up
    pub const fn unbounded(interval: Duration) -> Self {
        Self {
            max_attempts: None,
            interval,
        }
    }
}

/// Result of a poll that ran out of attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The operation produced a value
    Ready(T),
    /// Every attempt came back empty
    Exhausted {
        /// Number of attempts made
        attempts: u32,
    },
}

/// Run `op` until it returns `Some`, sleeping `policy.interval` between tries
///
/// Errors from `op` stop polling immediately and propagate. No sleep happens
/// after the final attempt.
pub async fn poll_until<T, F, Fut>(policy: PollPolicy, mut op: F) -> Result<PollOutcome<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if let Some(value) = op(attempt).await? {
            return Ok(PollOutcome::Ready(value));
        }

        if policy.max_attempts.is_some_and(|max| attempt >= max) {
            return Ok(PollOutcome::Exhausted { attempts: attempt });
        }

        trace!(attempt, interval_ms = policy.interval.as_millis(), "poll attempt came back empty");
        tokio::time::sleep(policy.interval).await;
    }
}
