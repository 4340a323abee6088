//! Orchestrator: lock, select, sync, report, unlock

use crate::deploy::report::report_outcomes;
use crate::deploy::select::{SelectOptions, select_pull_requests};
use crate::deploy::sync::{SyncOptions, sync_workspace};
use crate::error::Result;
use crate::git::VersionControl;
use crate::lock::{release, wait_for_lock};
use crate::platform::RepositoryHost;
use crate::retry::PollPolicy;
use crate::types::{DeployedLabelPolicy, LabelConfig};
use std::time::Duration;
use tracing::{Instrument, error, info, info_span};

/// Default lock ref template; `{base}` keeps base branches independent
pub const DEFAULT_LOCK_BRANCH: &str = "merge-pr-to-branch-lock-{base}";

/// Everything one reconciliation run needs to know
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Branch the target is rebuilt from
    pub base_branch: String,
    /// Branch this tool maintains
    pub target_branch: String,
    /// Request / deployed label names
    pub labels: LabelConfig,
    /// Resolved lock ref name
    pub lock_ref: String,
    /// Lock polling policy
    pub lock_poll: PollPolicy,
    /// Selection phase knobs
    pub select: SelectOptions,
    /// Workspace phase knobs
    pub sync: SyncOptions,
    /// Deployed-label handling for PRs merged again
    pub deployed_label_policy: DeployedLabelPolicy,
}

impl DeployOptions {
    /// Options with defaults for everything but the two branches
    pub fn new(base_branch: impl Into<String>, target_branch: impl Into<String>) -> Self {
        let base_branch = base_branch.into();
        let target_branch = target_branch.into();
        let lock_ref =
            crate::lock::resolve_lock_ref(DEFAULT_LOCK_BRANCH, &base_branch, &target_branch);
        Self {
            base_branch,
            target_branch,
            labels: LabelConfig::default(),
            lock_ref,
            lock_poll: PollPolicy::bounded(720, Duration::from_secs(5)),
            select: SelectOptions::default(),
            sync: SyncOptions::default(),
            deployed_label_policy: DeployedLabelPolicy::default(),
        }
    }
}

/// What a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentSummary {
    /// PRs selected for merging, in merge order
    pub selected: Vec<u64>,
    /// PRs merged into the target branch
    pub merged: Vec<u64>,
    /// PRs whose merge failed
    pub failed: Vec<u64>,
    /// PRs whose stale deployed label was stripped during selection
    pub corrected: Vec<u64>,
    /// Whether the target branch was force-pushed
    pub pushed: bool,
}

/// Select, sync and report without touching the lock
async fn reconcile(
    host: &dyn RepositoryHost,
    git: &dyn VersionControl,
    options: &DeployOptions,
) -> Result<DeploymentSummary> {
    let selection = select_pull_requests(
        host,
        &options.base_branch,
        &options.target_branch,
        &options.labels,
        &options.select,
    )
    .await?;

    let report = sync_workspace(
        host,
        git,
        &options.base_branch,
        &options.target_branch,
        &selection.mergeable,
        &options.sync,
    )
    .await?;

    report_outcomes(
        host,
        &report.outcomes,
        &options.labels,
        options.deployed_label_policy,
        options.select.concurrency,
    )
    .await?;

    let (merged, failed): (Vec<_>, Vec<_>) =
        report.outcomes.iter().partition(|o| o.is_success());

    Ok(DeploymentSummary {
        selected: selection.mergeable.iter().map(|pr| pr.number).collect(),
        merged: merged.iter().map(|o| o.pr_number).collect(),
        failed: failed.iter().map(|o| o.pr_number).collect(),
        corrected: selection.corrections.iter().map(|c| c.pr_number).collect(),
        pushed: report.pushed,
    })
}

/// Run one full reconciliation under the base branch lock
///
/// The lock is released exactly once after it is acquired, whether or not
/// the run succeeds. A failure to acquire never attempts a release. When
/// both the run and the release fail, the run's error wins and the release
/// error is logged.
pub async fn run_deployment(
    host: &dyn RepositoryHost,
    git: &dyn VersionControl,
    options: &DeployOptions,
) -> Result<DeploymentSummary> {
    let span = info_span!(
        "deploy",
        base = %options.base_branch,
        target = %options.target_branch
    );

    async {
        let handle = wait_for_lock(
            host,
            &options.lock_ref,
            &options.base_branch,
            options.lock_poll,
        )
        .await?;

        let result = reconcile(host, git, options).await;
        let released = release(host, handle).await;

        match (result, released) {
            (Ok(summary), Ok(())) => {
                info!(
                    merged = summary.merged.len(),
                    failed = summary.failed.len(),
                    pushed = summary.pushed,
                    "deployment run complete"
                );
                Ok(summary)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_error)) => {
                error!(error = %release_error, "failed to release lock after failed run");
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}
