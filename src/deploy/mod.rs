//! Reconciliation engine for the deployment branch
//!
//! Three phases run under a per-base-branch lock:
//! 1. Select - list requested PRs, resolve mergeability, heal stale labels
//! 2. Sync - rebuild target from base, merge PRs in order, push if changed
//! 3. Report - reflect each merge outcome onto its PR
//!
//! The label state machine and PR partitioning are pure functions; the
//! effectful steps go through [`RepositoryHost`](crate::platform::RepositoryHost)
//! and [`VersionControl`](crate::git::VersionControl).

mod report;
mod run;
mod select;
mod sync;

pub use report::{LabelAction, apply_label_actions, plan_label_actions, report_outcomes};
pub use run::{DEFAULT_LOCK_BRANCH, DeployOptions, DeploymentSummary, run_deployment};
pub use select::{
    DEFAULT_CONCURRENCY, SelectOptions, Selection, apply_corrections, partition_mergeable,
    partition_requested, select_pull_requests, sort_by_creation,
};
pub use sync::{
    SyncOptions, SyncReport, ensure_target_branch, fetch_pull_request_head, merge_message,
    merge_pull_requests, prepare_workspace, publish, pull_request_ref, sync_workspace,
};
