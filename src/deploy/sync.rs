//! Workspace synchronization - rebuild the target branch from base
//!
//! Every run resets the target branch to base's tip and merges the selected
//! PRs on top, so nothing carries over from earlier runs. The result is only
//! pushed when it differs from what is already published.

use crate::error::{Error, Result};
use crate::git::{VersionControl, remote_branch};
use crate::platform::RepositoryHost;
use crate::types::{ACTION_NAME, MergeOutcome, MergeStatus, PullRequestRecord};
use tracing::{debug, info, warn};

/// Knobs for the workspace phase
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Fetch depth; 0 fetches full history
    pub fetch_depth: u32,
    /// Committer email for merge commits
    pub committer_email: String,
    /// Committer name for merge commits
    pub committer_name: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            fetch_depth: 0,
            committer_email: "action@github.com".to_string(),
            committer_name: "GitHub Action".to_string(),
        }
    }
}

/// Result of the workspace phase
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// One outcome per selected PR, in merge order
    pub outcomes: Vec<MergeOutcome>,
    /// Whether the target branch was force-pushed
    pub pushed: bool,
}

/// Commit message for a PR's merge commit
pub fn merge_message(pr: &PullRequestRecord) -> String {
    format!("merged #{} ({}) by {ACTION_NAME}", pr.number, pr.head_ref)
}

/// Make sure the target branch exists on the host
///
/// Returns `true` when it had to be created from base.
pub async fn ensure_target_branch(
    host: &dyn RepositoryHost,
    base_branch: &str,
    target_branch: &str,
) -> Result<bool> {
    if host.get_branch_ref(target_branch).await?.is_some() {
        debug!(target = target_branch, "target branch exists");
        return Ok(false);
    }

    info!(target = target_branch, base = base_branch, "creating target branch");
    host.create_branch(target_branch, base_branch).await?;
    Ok(true)
}

/// Ref GitHub keeps for a PR's head, present for fork PRs too
pub fn pull_request_ref(number: u64) -> String {
    format!("refs/pull/{number}/head")
}

/// Set up a fresh workspace with target checked out at base's tip
///
/// PR heads are not fetched here; see [`fetch_pull_request_head`].
pub async fn prepare_workspace(
    git: &dyn VersionControl,
    remote_url: &str,
    base_branch: &str,
    target_branch: &str,
    options: &SyncOptions,
) -> Result<()> {
    git.init().await?;
    git.configure_identity(&options.committer_email, &options.committer_name)
        .await?;
    git.add_remote(remote_url).await?;

    let refs = [base_branch.to_string(), target_branch.to_string()];
    info!(base = base_branch, target = target_branch, "fetching branches");
    git.fetch(options.fetch_depth, &refs).await?;

    git.checkout(target_branch).await?;
    for line in git.status().await? {
        debug!(status = %line);
    }

    let base = remote_branch(base_branch);
    info!(target = target_branch, base = %base, "resetting target to base");
    git.hard_reset_to(&base).await
}

/// Put the working tree back in a clean state after a failed merge
async fn clean_up_failed_merge(git: &dyn VersionControl) -> Result<()> {
    if let Err(e) = git.abort_merge().await {
        warn!(error = %e, "merge --abort failed, resetting to HEAD");
        git.hard_reset_to("HEAD").await?;
    }
    Ok(())
}

/// Fetch a PR's head commit into the workspace
///
/// Tries the host's pull ref first and falls back to the head branch for
/// remotes that do not publish pull refs.
pub async fn fetch_pull_request_head(
    git: &dyn VersionControl,
    pr: &PullRequestRecord,
    depth: u32,
) -> Result<()> {
    let pull_ref = pull_request_ref(pr.number);
    match git.fetch(depth, std::slice::from_ref(&pull_ref)).await {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(pr_number = pr.number, error = %e, "no pull ref, fetching head branch");
            git.fetch(depth, std::slice::from_ref(&pr.head_ref)).await
        }
    }
}

/// Fetch and merge each PR's head in order, recording one outcome per PR
///
/// A head that cannot be fetched or merged is recorded as failed and the
/// loop moves on to the next PR. Only a failure to clean up after a failed
/// merge aborts the loop.
pub async fn merge_pull_requests(
    git: &dyn VersionControl,
    target_branch: &str,
    prs: &[PullRequestRecord],
    fetch_depth: u32,
) -> Result<Vec<MergeOutcome>> {
    let mut outcomes = Vec::with_capacity(prs.len());

    for pr in prs {
        if let Err(e) = fetch_pull_request_head(git, pr, fetch_depth).await {
            warn!(pr_number = pr.number, head = %pr.head_ref, error = %e, "fetch failed");
            outcomes.push(MergeOutcome {
                pr_number: pr.number,
                labels: pr.labels.clone(),
                status: MergeStatus::Failed {
                    error_message: format!("Skipped PR due to fetch error: \n{e}"),
                },
            });
            continue;
        }

        let status = match git.merge_commit(&pr.head_sha, &merge_message(pr)).await {
            Ok(()) => {
                info!(pr_number = pr.number, sha = %pr.head_sha, "merged pull request");
                MergeStatus::Merged {
                    message: format!(
                        "Successfully merged '{}' to '{target_branch}'.",
                        pr.head_sha
                    ),
                }
            }
            Err(e) => {
                let error_message = format!("Skipped PR due to merge error: \n{e}");
                warn!(pr_number = pr.number, error = %e, "merge failed");
                clean_up_failed_merge(git).await?;
                MergeStatus::Failed { error_message }
            }
        };

        outcomes.push(MergeOutcome {
            pr_number: pr.number,
            labels: pr.labels.clone(),
            status,
        });
    }

    Ok(outcomes)
}

/// Push the target branch if it differs from the published one
///
/// Returns whether a push happened. When nothing changed, the local branch
/// is reset to the remote so no stray merge commits linger.
pub async fn publish(git: &dyn VersionControl, target_branch: &str) -> Result<bool> {
    let upstream = remote_branch(target_branch);
    let diff = git.diff_short_stat(target_branch, &upstream).await?;
    let changed: Vec<&str> = diff
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    if changed.is_empty() {
        info!(target = target_branch, "target branch unchanged, skipping push");
        git.hard_reset_to(&upstream).await?;
        return Ok(false);
    }

    info!(target = target_branch, diff = %changed.join(" "), "pushing target branch");
    git.force_push(target_branch).await?;
    Ok(true)
}

/// Rebuild the target branch and publish it
pub async fn sync_workspace(
    host: &dyn RepositoryHost,
    git: &dyn VersionControl,
    base_branch: &str,
    target_branch: &str,
    prs: &[PullRequestRecord],
    options: &SyncOptions,
) -> Result<SyncReport> {
    if host.get_branch_ref(base_branch).await?.is_none() {
        return Err(Error::BaseBranchMissing(base_branch.to_string()));
    }
    ensure_target_branch(host, base_branch, target_branch).await?;

    prepare_workspace(
        git,
        &host.remote_url(),
        base_branch,
        target_branch,
        options,
    )
    .await?;

    let outcomes = merge_pull_requests(git, target_branch, prs, options.fetch_depth).await?;
    let pushed = publish(git, target_branch).await?;

    Ok(SyncReport { outcomes, pushed })
}
