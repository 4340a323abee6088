//! Error types for merge-pr-to-branch

use thiserror::Error;

/// Errors that can abort a reconciliation run
///
/// Per-PR merge failures are not errors: they are recorded as
/// [`MergeStatus::Failed`](crate::types::MergeStatus::Failed) and reported
/// on the pull request.
#[derive(Debug, Error)]
pub enum Error {
    /// A branch ref could not be created because it already exists
    #[error("ref already exists: {0}")]
    RefConflict(String),

    /// The base branch could not be resolved to a commit
    #[error("base branch '{0}' not found")]
    BaseBranchMissing(String),

    /// A page of a paginated listing failed
    #[error("pagination failed on page {page}: {message}")]
    Pagination {
        /// 1-based page number that failed
        page: u32,
        /// Failure detail from the host
        message: String,
    },

    /// GitHub API error with context
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// Raw octocrab error
    #[error("GitHub API error: {0}")]
    Octocrab(#[from] octocrab::Error),

    /// Generic platform error
    #[error("platform error: {0}")]
    Platform(String),

    /// A git subprocess exited unsuccessfully
    #[error("git {command} failed ({status}): {stderr}")]
    Git {
        /// Subcommand and arguments, credentials redacted
        command: String,
        /// Exit status description
        status: String,
        /// Captured stderr, trimmed
        stderr: String,
    },

    /// The lock could not be acquired within the configured attempts
    #[error("could not acquire lock '{lock_ref}' after {attempts} attempts")]
    LockTimeout {
        /// Lock ref name
        lock_ref: String,
        /// Number of acquisition attempts made
        attempts: u32,
    },

    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Authentication could not be resolved
    #[error("authentication error: {0}")]
    Auth(String),

    /// The triggering event payload could not be used
    #[error("event error: {0}")]
    Event(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;
