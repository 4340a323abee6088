//! Pull request selection and stale-label correction
//!
//! Decides which requested PRs take part in this run and which PRs carry a
//! deployed label that no longer matches reality. The partitioning steps are
//! pure; fetching and applying corrections are the only effects.

use crate::error::Result;
use crate::platform::RepositoryHost;
use crate::types::{
    CorrectionReason, LabelConfig, LabelCorrection, Mergeable, PullRequestRecord, comment_body,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::time::Duration;
use tracing::{debug, info};

/// Default fan-out for concurrent host calls
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Knobs for the selection phase
#[derive(Debug, Clone)]
pub struct SelectOptions {
    /// Extra detail fetches for a PR whose mergeability is still being computed
    pub mergeable_retries: u32,
    /// Wait between those fetches
    pub mergeable_retry_interval: Duration,
    /// Maximum concurrent detail fetches / corrections
    pub concurrency: usize,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            mergeable_retries: 3,
            mergeable_retry_interval: Duration::from_secs(1),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// PRs to merge this run, plus the label corrections that were applied
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Mergeable, requested PRs in merge order (oldest first)
    pub mergeable: Vec<PullRequestRecord>,
    /// Deployed labels stripped during selection
    pub corrections: Vec<LabelCorrection>,
}

/// Order PRs by creation time, oldest first, with the PR number as tiebreaker
///
/// The host already sorts, but the merge order must not depend on that.
pub fn sort_by_creation(prs: &mut [PullRequestRecord]) {
    prs.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.number.cmp(&b.number))
    });
}

/// Split listed PRs into requested ones and corrections for un-requested ones
///
/// A PR without the request label but still marked deployed was removed
/// from deployment since the last run.
pub fn partition_requested(
    prs: Vec<PullRequestRecord>,
    labels: &LabelConfig,
) -> (Vec<PullRequestRecord>, Vec<LabelCorrection>) {
    let mut corrections = Vec::new();
    let requested = prs
        .into_iter()
        .filter(|pr| {
            let include = pr.has_label(&labels.request);
            if !include && pr.has_label(&labels.deployed) {
                debug!(pr_number = pr.number, "deployed PR lost its request label");
                corrections.push(LabelCorrection {
                    pr_number: pr.number,
                    reason: CorrectionReason::RequestLabelMissing,
                });
            }
            include
        })
        .collect();
    (requested, corrections)
}

/// Keep PRs whose detail fetch says they are mergeable
///
/// Anything not `Mergeable` is excluded. An excluded PR that is still marked
/// deployed gets a correction.
pub fn partition_mergeable(
    detailed: Vec<PullRequestRecord>,
    labels: &LabelConfig,
) -> (Vec<PullRequestRecord>, Vec<LabelCorrection>) {
    let mut corrections = Vec::new();
    let mergeable = detailed
        .into_iter()
        .filter(|pr| {
            if pr.mergeable == Mergeable::Mergeable {
                info!(pr_number = pr.number, "found mergeable pull request");
                return true;
            }
            info!(pr_number = pr.number, mergeable = %pr.mergeable, "skipping unmergeable pull request");
            if pr.has_label(&labels.deployed) {
                corrections.push(LabelCorrection {
                    pr_number: pr.number,
                    reason: CorrectionReason::Unmergeable,
                });
            }
            false
        })
        .collect();
    (mergeable, corrections)
}

/// Fetch a PR until the host has finished computing its mergeability
///
/// A flag still unknown after `retries` extra fetches is treated as
/// conflicted.
async fn fetch_resolved(
    host: &dyn RepositoryHost,
    number: u64,
    retries: u32,
    interval: Duration,
) -> Result<PullRequestRecord> {
    let mut attempt = 0;
    loop {
        let mut pr = host.get_pull_request(number).await?;
        if pr.mergeable != Mergeable::Unknown {
            return Ok(pr);
        }
        if attempt >= retries {
            debug!(pr_number = number, attempts = attempt + 1, "mergeability never resolved");
            pr.mergeable = Mergeable::Conflicted;
            return Ok(pr);
        }
        attempt += 1;
        debug!(pr_number = number, attempt, "mergeability still computing, retrying");
        tokio::time::sleep(interval).await;
    }
}

/// Strip the deployed label and explain why, for each correction
pub async fn apply_corrections(
    host: &dyn RepositoryHost,
    corrections: &[LabelCorrection],
    target_branch: &str,
    labels: &LabelConfig,
    concurrency: usize,
) -> Result<()> {
    stream::iter(corrections)
        .map(|correction| async move {
            let message = correction.message(target_branch, labels);
            info!(pr_number = correction.pr_number, %message, "correcting stale label");
            host.remove_label(correction.pr_number, &labels.deployed)
                .await?;
            host.create_comment(correction.pr_number, &comment_body(&message))
                .await
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect::<Vec<()>>()
        .await?;
    Ok(())
}

/// Compute the ordered set of PRs to merge and heal stale deployed labels
pub async fn select_pull_requests(
    host: &dyn RepositoryHost,
    base_branch: &str,
    target_branch: &str,
    labels: &LabelConfig,
    options: &SelectOptions,
) -> Result<Selection> {
    let mut listed = host.list_pull_requests(base_branch).await?;
    sort_by_creation(&mut listed);
    info!(
        count = listed.len(),
        base = base_branch,
        "found open pull requests"
    );

    let (requested, mut corrections) = partition_requested(listed, labels);
    info!(
        count = requested.len(),
        label = %labels.request,
        "found pull requests requesting deployment"
    );

    let detailed: Vec<PullRequestRecord> = stream::iter(&requested)
        .map(|pr| {
            fetch_resolved(
                host,
                pr.number,
                options.mergeable_retries,
                options.mergeable_retry_interval,
            )
        })
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await?;

    let (mergeable, unmergeable_corrections) = partition_mergeable(detailed, labels);
    corrections.extend(unmergeable_corrections);

    apply_corrections(
        host,
        &corrections,
        target_branch,
        labels,
        options.concurrency,
    )
    .await?;

    Ok(Selection {
        mergeable,
        corrections,
    })
}
