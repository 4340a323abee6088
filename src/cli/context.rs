//! Shared setup for a reconciliation run
//!
//! Resolves the repository, base branch and token, then builds the GitHub
//! service and a throwaway git workspace.

use crate::cli::Cli;
use merge_pr_to_branch::auth::get_github_auth;
use merge_pr_to_branch::config::{RepositorySlug, TriggerEvent};
use merge_pr_to_branch::deploy::DeployOptions;
use merge_pr_to_branch::error::{Error, Result};
use merge_pr_to_branch::git::{GitCommandManager, GitCredentials};
use merge_pr_to_branch::platform::GitHubService;
use tempfile::TempDir;
use tracing::debug;

/// Git username used when no actor is known
const DEFAULT_GIT_USERNAME: &str = "x-access-token";

/// Everything a run needs, owned for its duration
///
/// The workspace directory is removed when the context is dropped.
pub struct RunContext {
    /// GitHub API client
    pub host: GitHubService,
    /// git runner bound to `workspace`
    pub git: GitCommandManager,
    /// Resolved run options
    pub options: DeployOptions,
    /// Temporary working directory
    pub workspace: TempDir,
}

/// Load the triggering event, if the environment names one
pub fn load_event(cli: &Cli) -> Result<Option<TriggerEvent>> {
    let Some(name) = cli.event_name.as_deref() else {
        return Ok(None);
    };

    match cli.event_path.as_deref() {
        Some(path) => TriggerEvent::load(name, path).map(Some),
        None => Ok(Some(TriggerEvent {
            name: name.to_string(),
            ..TriggerEvent::default()
        })),
    }
}

/// Repository from the flag, else from the event payload
pub fn resolve_repository(cli: &Cli, event: Option<&TriggerEvent>) -> Result<RepositorySlug> {
    if let Some(repository) = cli.repository.as_deref() {
        return repository.parse();
    }
    event.and_then(TriggerEvent::repository).ok_or_else(|| {
        Error::Config("no repository given: pass --repository or set GITHUB_REPOSITORY".to_string())
    })
}

impl RunContext {
    /// Build the context for a run against `base_branch`
    pub async fn new(cli: &Cli, repository: RepositorySlug, base_branch: &str) -> Result<Self> {
        let options = cli.deploy.deploy_options(base_branch)?;

        let auth = get_github_auth(cli.repo_token.clone(), cli.github_host.as_deref()).await?;
        debug!(source = ?auth.source, repository = %repository, "resolved GitHub token");

        let host = GitHubService::new(
            &auth.token,
            repository.owner,
            repository.repo,
            cli.github_host.clone(),
        )?;

        let workspace = tempfile::Builder::new()
            .prefix("merge-pr-to-branch-")
            .tempdir()?;
        let credentials = GitCredentials {
            username: cli
                .actor
                .clone()
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| DEFAULT_GIT_USERNAME.to_string()),
            token: auth.token,
        };
        let git = GitCommandManager::new(workspace.path(), Some(credentials));

        Ok(Self {
            host,
            git,
            options,
            workspace,
        })
    }
}
