//! Repository host services
//!
//! Provides the narrow host interface the reconciliation engine consumes.

mod github;

pub use github::GitHubService;

use crate::error::Result;
use crate::types::{BranchRef, PlatformConfig, PullRequestRecord};
use async_trait::async_trait;

/// Repository host trait for branch, PR and label operations
///
/// This trait abstracts the host API so the engine can run against GitHub
/// or an in-memory double. Recoverable outcomes (missing refs, already
/// deleted refs) are part of the return type, not errors.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Resolve a branch to its commit, `None` if the branch does not exist
    async fn get_branch_ref(&self, branch: &str) -> Result<Option<BranchRef>>;

    /// Create `branch` at the current commit of `from_branch`
    ///
    /// Fails with [`Error::RefConflict`](crate::Error::RefConflict) when
    /// `branch` already exists, and with
    /// [`Error::BaseBranchMissing`](crate::Error::BaseBranchMissing) when
    /// `from_branch` does not.
    async fn create_branch(&self, branch: &str, from_branch: &str) -> Result<BranchRef>;

    /// Delete a branch; succeeds when the branch is already gone
    async fn delete_branch(&self, branch: &str) -> Result<()>;

    /// List every open PR against `base`, oldest first
    ///
    /// Walks all pages. A failed page fails the whole listing. The returned
    /// records always have `mergeable: Unknown`.
    async fn list_pull_requests(&self, base: &str) -> Result<Vec<PullRequestRecord>>;

    /// Fetch a single PR with an authoritative mergeable flag
    async fn get_pull_request(&self, number: u64) -> Result<PullRequestRecord>;

    /// Add a label to a PR
    async fn add_label(&self, number: u64, label: &str) -> Result<()>;

    /// Remove a label from a PR
    async fn remove_label(&self, number: u64, label: &str) -> Result<()>;

    /// Create a comment on a PR
    async fn create_comment(&self, number: u64, body: &str) -> Result<()>;

    /// Credential-free clone URL for the repository
    fn remote_url(&self) -> String;

    /// Get the platform configuration
    fn config(&self) -> &PlatformConfig;
}
