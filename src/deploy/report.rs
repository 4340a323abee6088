//! Reflect merge outcomes back onto pull requests
//!
//! [`plan_label_actions`] is the label state machine (pure);
//! [`report_outcomes`] applies the planned actions through the host.

use crate::error::Result;
use crate::platform::RepositoryHost;
use crate::types::{DeployedLabelPolicy, LabelConfig, MergeOutcome, MergeStatus, comment_body};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

/// One host mutation on a PR
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelAction {
    /// Remove a label
    RemoveLabel(String),
    /// Add a label
    AddLabel(String),
    /// Post a comment (body already signed)
    Comment(String),
}

impl std::fmt::Display for LabelAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemoveLabel(label) => write!(f, "remove label '{label}'"),
            Self::AddLabel(label) => write!(f, "add label '{label}'"),
            Self::Comment(_) => write!(f, "comment"),
        }
    }
}

/// Decide the label and comment mutations for one outcome (PURE)
///
/// - failure: drop the request label, comment the error, then drop the
///   deployed label if present
/// - success on an unmarked PR: comment the success, then add the deployed
///   label
/// - success on a marked PR: nothing under [`DeployedLabelPolicy::Keep`];
///   drop the deployed label under [`DeployedLabelPolicy::Reprove`]
pub fn plan_label_actions(
    outcome: &MergeOutcome,
    labels: &LabelConfig,
    policy: DeployedLabelPolicy,
) -> Vec<LabelAction> {
    let mut actions = Vec::new();
    let deployed = outcome.labels.contains(&labels.deployed);

    match &outcome.status {
        MergeStatus::Failed { error_message } => {
            actions.push(LabelAction::RemoveLabel(labels.request.clone()));
            actions.push(LabelAction::Comment(comment_body(error_message)));
            if deployed {
                actions.push(LabelAction::RemoveLabel(labels.deployed.clone()));
            }
        }
        MergeStatus::Merged { message } => {
            if !deployed {
                actions.push(LabelAction::Comment(comment_body(message)));
                actions.push(LabelAction::AddLabel(labels.deployed.clone()));
            } else if policy == DeployedLabelPolicy::Reprove {
                actions.push(LabelAction::RemoveLabel(labels.deployed.clone()));
            }
        }
    }

    actions
}

/// Apply actions to one PR, in order
pub async fn apply_label_actions(
    host: &dyn RepositoryHost,
    pr_number: u64,
    actions: &[LabelAction],
) -> Result<()> {
    for action in actions {
        debug!(pr_number, %action, "applying");
        match action {
            LabelAction::RemoveLabel(label) => host.remove_label(pr_number, label).await?,
            LabelAction::AddLabel(label) => host.add_label(pr_number, label).await?,
            LabelAction::Comment(body) => host.create_comment(pr_number, body).await?,
        }
    }
    Ok(())
}

/// Reconcile labels and comments for every outcome
///
/// PRs are handled concurrently and independently; the first failure is
/// returned once in-flight work settles.
pub async fn report_outcomes(
    host: &dyn RepositoryHost,
    outcomes: &[MergeOutcome],
    labels: &LabelConfig,
    policy: DeployedLabelPolicy,
    concurrency: usize,
) -> Result<()> {
    stream::iter(outcomes)
        .map(|outcome| async move {
            let actions = plan_label_actions(outcome, labels, policy);
            if actions.is_empty() {
                debug!(pr_number = outcome.pr_number, "labels already up to date");
                return Ok(());
            }
            info!(
                pr_number = outcome.pr_number,
                success = outcome.is_success(),
                actions = actions.len(),
                "reconciling pull request"
            );
            apply_label_actions(host, outcome.pr_number, &actions).await
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect::<Vec<()>>()
        .await?;
    Ok(())
}
