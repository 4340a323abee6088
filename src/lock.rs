//! Branch-ref mutex serializing runs against one base branch
//!
//! The host's "create ref" call is atomic: exactly one caller can create a
//! given ref, everyone else gets a conflict. Holding the lock means having
//! created the ref; releasing it means deleting the ref.

use crate::error::{Error, Result};
use crate::platform::RepositoryHost;
use crate::retry::{PollOutcome, PollPolicy, poll_until};
use std::time::Instant;
use tracing::{debug, info};

/// Ownership of the lock ref for one base branch
///
/// Only [`acquire`] creates a handle and [`release`] consumes it, so a
/// handle is released at most once.
#[derive(Debug)]
#[must_use = "a held lock must be released"]
pub struct LockHandle {
    lock_ref: String,
    base_branch: String,
    acquired_at: Instant,
}

impl LockHandle {
    /// Name of the branch ref backing the lock
    pub fn lock_ref(&self) -> &str {
        &self.lock_ref
    }

    /// Base branch the lock serializes
    pub fn base_branch(&self) -> &str {
        &self.base_branch
    }
}

/// Expand `{base}` and `{target}` in a lock branch template
pub fn resolve_lock_ref(template: &str, base_branch: &str, target_branch: &str) -> String {
    template
        .replace("{base}", base_branch)
        .replace("{target}", target_branch)
}

/// Try once to take the lock
///
/// Returns `None` when another run holds it. Any failure other than the
/// ref already existing propagates.
pub async fn acquire(
    host: &dyn RepositoryHost,
    lock_ref: &str,
    base_branch: &str,
) -> Result<Option<LockHandle>> {
    debug!(lock_ref, base_branch, "acquiring lock");
    match host.create_branch(lock_ref, base_branch).await {
        Ok(_) => {
            info!(lock_ref, "acquired lock");
            Ok(Some(LockHandle {
                lock_ref: lock_ref.to_string(),
                base_branch: base_branch.to_string(),
                acquired_at: Instant::now(),
            }))
        }
        Err(Error::RefConflict(_)) => {
            info!(lock_ref, "lock held by another run, waiting");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Release the lock by deleting its ref
///
/// A lock ref that is already gone counts as released.
pub async fn release(host: &dyn RepositoryHost, handle: LockHandle) -> Result<()> {
    debug!(lock_ref = %handle.lock_ref, "releasing lock");
    host.delete_branch(&handle.lock_ref).await?;
    info!(
        lock_ref = %handle.lock_ref,
        held_ms = handle.acquired_at.elapsed().as_millis(),
        "released lock"
    );
    Ok(())
}

/// Poll [`acquire`] until the lock is taken
///
/// Fails with [`Error::LockTimeout`] once `policy.max_attempts` is used up.
pub async fn wait_for_lock(
    host: &dyn RepositoryHost,
    lock_ref: &str,
    base_branch: &str,
    policy: PollPolicy,
) -> Result<LockHandle> {
    let outcome = poll_until(policy, |attempt| {
        debug!(lock_ref, attempt, "lock attempt");
        acquire(host, lock_ref, base_branch)
    })
    .await?;

    match outcome {
        PollOutcome::Ready(handle) => Ok(handle),
        PollOutcome::Exhausted { attempts } => Err(Error::LockTimeout {
            lock_ref: lock_ref.to_string(),
            attempts,
        }),
    }
}
