//! Run command - one reconciliation of the target branch

use crate::cli::Cli;
use crate::cli::context::{RunContext, load_event, resolve_repository};
use merge_pr_to_branch::deploy::{DeploymentSummary, run_deployment};
use merge_pr_to_branch::error::Result;
use tracing::info;

/// Run the reconciliation described by `cli`
///
/// Returns `None` when the triggering event names no base branch.
pub async fn run(cli: &Cli) -> Result<Option<DeploymentSummary>> {
    let event = load_event(cli)?;

    let base_branch = match (&cli.deploy.base_branch, &event) {
        (Some(base), _) => base.clone(),
        (None, Some(event)) => match event.base_branch() {
            Some(base) => base,
            None => {
                info!(event = %event.name, "event does not name a base branch, skipping");
                return Ok(None);
            }
        },
        (None, None) => {
            info!("no base branch and no triggering event, skipping");
            return Ok(None);
        }
    };

    let repository = resolve_repository(cli, event.as_ref())?;
    let repository_name = repository.to_string();
    let ctx = RunContext::new(cli, repository, &base_branch).await?;
    info!(
        repository = %repository_name,
        base = %ctx.options.base_branch,
        target = %ctx.options.target_branch,
        workspace = %ctx.workspace.path().display(),
        "starting reconciliation"
    );

    let summary = run_deployment(&ctx.host, &ctx.git, &ctx.options).await?;
    info!(
        selected = ?summary.selected,
        merged = ?summary.merged,
        failed = ?summary.failed,
        corrected = ?summary.corrected,
        pushed = summary.pushed,
        "reconciliation finished"
    );
    Ok(Some(summary))
}
