//! Local git workspace operations
//!
//! The engine never shells out directly; it drives a [`VersionControl`]
//! implementation bound to a single working directory.

mod command;

pub use command::{GitCommandManager, GitCredentials, REMOTE_NAME};

use crate::error::Result;
use async_trait::async_trait;

/// Git operations the workspace synchronizer needs
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Create an empty repository in the working directory
    async fn init(&self) -> Result<()>;

    /// Set the committer identity for merge commits
    async fn configure_identity(&self, email: &str, name: &str) -> Result<()>;

    /// Register the remote the workspace fetches from and pushes to
    async fn add_remote(&self, url: &str) -> Result<()>;

    /// Fetch exactly `refs` from the remote, without tags, pruning stale refs
    ///
    /// `depth == 0` fetches full history.
    async fn fetch(&self, depth: u32, refs: &[String]) -> Result<()>;

    /// Check out `branch` as a local branch at its remote-tracking commit
    async fn checkout(&self, branch: &str) -> Result<()>;

    /// Working tree status, one line per output line
    async fn status(&self) -> Result<Vec<String>>;

    /// Hard-reset the current branch to `rev`
    async fn hard_reset_to(&self, rev: &str) -> Result<()>;

    /// Merge `commit` into the current branch with a merge commit
    async fn merge_commit(&self, commit: &str, message: &str) -> Result<()>;

    /// Abandon an in-progress merge
    async fn abort_merge(&self) -> Result<()>;

    /// `git diff --shortstat` between two revisions; empty when trees match
    async fn diff_short_stat(&self, rev_a: &str, rev_b: &str) -> Result<Vec<String>>;

    /// Force-push `branch` to the remote
    async fn force_push(&self, branch: &str) -> Result<()>;
}

/// Remote-tracking name for a branch on the workspace remote
pub fn remote_branch(branch: &str) -> String {
    format!("{REMOTE_NAME}/{branch}")
}
