//! Core types for merge-pr-to-branch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Name used to sign comments and merge commits
pub const ACTION_NAME: &str = "merge-pr-to-branch";

/// A branch ref resolved on the host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchRef {
    /// Branch name (without `refs/heads/`)
    pub name: String,
    /// Commit SHA the branch points at
    pub sha: String,
}

/// Host-computed mergeability of a pull request
///
/// List responses never carry a trustworthy value, so records built from
/// them are always `Unknown`. Only the single-item fetch resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Mergeable {
    /// Not computed yet (or not fetched from the detail endpoint)
    #[default]
    Unknown,
    /// Head can be merged into base without conflict
    Mergeable,
    /// Head conflicts with base
    Conflicted,
}

impl Mergeable {
    /// Map the host's nullable flag onto the tri-state
    pub const fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Self::Mergeable,
            Some(false) => Self::Conflicted,
            None => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Mergeable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Mergeable => write!(f, "mergeable"),
            Self::Conflicted => write!(f, "conflicted"),
        }
    }
}

/// An open pull request as seen by one run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequestRecord {
    /// PR number
    pub number: u64,
    /// Head commit SHA
    pub head_sha: String,
    /// Head branch name
    pub head_ref: String,
    /// Label names currently on the PR
    pub labels: BTreeSet<String>,
    /// Mergeability, authoritative only after a detail fetch
    pub mergeable: Mergeable,
    /// Creation time, used to fix the merge order
    pub created_at: Option<DateTime<Utc>>,
}

impl PullRequestRecord {
    /// Whether the PR carries `label`
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// Platform configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Custom host (None for github.com)
    pub host: Option<String>,
}

// =============================================================================
// Label state machine types
// =============================================================================

/// Label names threaded through selection and reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelConfig {
    /// Label requesting inclusion in the target branch
    pub request: String,
    /// Label marking a PR as merged into the target branch
    pub deployed: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            request: "deploy".to_string(),
            deployed: "deployed".to_string(),
        }
    }
}

/// What to do with the deployed label when an already-deployed PR merges again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeployedLabelPolicy {
    /// Leave the label in place; repeated runs make no label changes
    #[default]
    Keep,
    /// Strip the label on every reprocess so the next run re-adds it
    Reprove,
}

/// Outcome of merging one PR into the target branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStatus {
    /// Merge commit created
    Merged {
        /// Success message posted to the PR
        message: String,
    },
    /// Merge failed and was aborted
    Failed {
        /// Error detail posted to the PR
        error_message: String,
    },
}

/// Per-PR merge result handed from sync to report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// PR number
    pub pr_number: u64,
    /// Labels the PR carried when it was selected
    pub labels: BTreeSet<String>,
    /// What happened
    pub status: MergeStatus,
}

impl MergeOutcome {
    /// Whether the merge succeeded
    pub const fn is_success(&self) -> bool {
        matches!(self.status, MergeStatus::Merged { .. })
    }
}

/// Why a PR's deployed label is being stripped during selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionReason {
    /// The request label was removed since the last run
    RequestLabelMissing,
    /// The PR is no longer mergeable into base
    Unmergeable,
}

/// A queued fix for a PR whose deployed label no longer reflects reality
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCorrection {
    /// PR number
    pub pr_number: u64,
    /// Why the label is stale
    pub reason: CorrectionReason,
}

impl LabelCorrection {
    /// Comment text explaining the correction
    pub fn message(&self, target_branch: &str, labels: &LabelConfig) -> String {
        match self.reason {
            CorrectionReason::RequestLabelMissing => format!(
                "Removing pull request from {target_branch} due to missing '{}' label.",
                labels.request
            ),
            CorrectionReason::Unmergeable => {
                format!("Removing pull request from {target_branch} due to unmergeable PR.")
            }
        }
    }
}

/// Prefix a comment body with the action signature
pub fn comment_body(message: &str) -> String {
    format!("{ACTION_NAME}:\n{message}")
}
