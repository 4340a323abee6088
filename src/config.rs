//! Run configuration
//!
//! [`DeployConfig`] holds the tuning flags (each with an environment
//! fallback) and turns them into [`DeployOptions`]. The base branch comes
//! from the triggering event: GitHub Actions exposes its name in
//! `GITHUB_EVENT_NAME` and the webhook payload as a JSON file at
//! `GITHUB_EVENT_PATH`.

use crate::deploy::{
    DEFAULT_CONCURRENCY, DEFAULT_LOCK_BRANCH, DeployOptions, SelectOptions, SyncOptions,
};
use crate::error::{Error, Result};
use crate::lock::resolve_lock_ref;
use crate::retry::PollPolicy;
use crate::types::{DeployedLabelPolicy, LabelConfig};
use clap::Args;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Reconciliation settings
#[derive(Debug, Clone, Args)]
pub struct DeployConfig {
    /// Branch to rebuild from base plus requested pull requests
    #[arg(long, env = "INPUT_TARGET_BRANCH")]
    pub target_branch: String,

    /// Base branch; derived from the triggering event when omitted
    #[arg(long)]
    pub base_branch: Option<String>,

    /// Label requesting inclusion in the target branch
    #[arg(long, env = "INPUT_REQUEST_LABEL_NAME", default_value = "deploy")]
    pub request_label_name: String,

    /// Label marking a pull request as merged into the target branch
    #[arg(long, env = "INPUT_DEPLOYED_LABEL_NAME", default_value = "deployed")]
    pub deployed_label_name: String,

    /// Lock branch name; `{base}` and `{target}` are substituted
    #[arg(long, env = "INPUT_LOCK_BRANCH_NAME", default_value = DEFAULT_LOCK_BRANCH)]
    pub lock_branch_name: String,

    /// Milliseconds between lock acquisition attempts
    #[arg(long, env = "INPUT_LOCK_CHECK_INTERVAL_MS", default_value_t = 5000)]
    pub lock_check_interval_ms: u64,

    /// Lock acquisition attempts before giving up (0 waits forever)
    #[arg(long, default_value_t = 720)]
    pub lock_max_attempts: u32,

    /// Extra fetches for a pull request whose mergeability is still unknown
    #[arg(long, default_value_t = 3)]
    pub mergeable_retries: u32,

    /// Fetch depth for the workspace (0 fetches full history)
    #[arg(long, default_value_t = 0)]
    pub fetch_depth: u32,

    /// Committer email for merge commits
    #[arg(long, default_value = "action@github.com")]
    pub committer_email: String,

    /// Committer name for merge commits
    #[arg(long, default_value = "GitHub Action")]
    pub committer_name: String,

    /// Strip the deployed label whenever a deployed pull request is merged again
    ///
    /// This is how the original merge-pr-to-branch action behaves. By
    /// default the label is kept, so a repeat run over unchanged pull
    /// requests changes nothing.
    #[arg(long)]
    pub reprove_deployed: bool,

    /// Maximum concurrent API calls per phase
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

impl DeployConfig {
    /// Config with defaults for everything but the target branch
    pub fn new(target_branch: impl Into<String>) -> Self {
        Self {
            target_branch: target_branch.into(),
            base_branch: None,
            request_label_name: "deploy".to_string(),
            deployed_label_name: "deployed".to_string(),
            lock_branch_name: DEFAULT_LOCK_BRANCH.to_string(),
            lock_check_interval_ms: 5000,
            lock_max_attempts: 720,
            mergeable_retries: 3,
            fetch_depth: 0,
            committer_email: "action@github.com".to_string(),
            committer_name: "GitHub Action".to_string(),
            reprove_deployed: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Validate and build the options for a run against `base_branch`
    pub fn deploy_options(&self, base_branch: &str) -> Result<DeployOptions> {
        let target = self.target_branch.trim();
        let request = self.request_label_name.trim();
        let deployed = self.deployed_label_name.trim();

        if target.is_empty() {
            return Err(Error::Config("target branch must not be empty".to_string()));
        }
        if base_branch.is_empty() {
            return Err(Error::Config("base branch must not be empty".to_string()));
        }
        if target == base_branch {
            return Err(Error::Config(format!(
                "target branch '{target}' must differ from the base branch"
            )));
        }
        if request.is_empty() || deployed.is_empty() {
            return Err(Error::Config("label names must not be empty".to_string()));
        }
        if request == deployed {
            return Err(Error::Config(format!(
                "request and deployed labels must differ (both '{request}')"
            )));
        }
        if self.lock_check_interval_ms == 0 {
            return Err(Error::Config(
                "lock check interval must be positive".to_string(),
            ));
        }

        let lock_ref = resolve_lock_ref(self.lock_branch_name.trim(), base_branch, target);
        if lock_ref.is_empty() || lock_ref == base_branch || lock_ref == target {
            return Err(Error::Config(format!(
                "lock branch '{lock_ref}' must be distinct from base and target"
            )));
        }

        let interval = Duration::from_millis(self.lock_check_interval_ms);
        let lock_poll = match self.lock_max_attempts {
            0 => PollPolicy::unbounded(interval),
            n => PollPolicy::bounded(n, interval),
        };

        Ok(DeployOptions {
            base_branch: base_branch.to_string(),
            target_branch: target.to_string(),
            labels: LabelConfig {
                request: request.to_string(),
                deployed: deployed.to_string(),
            },
            lock_ref,
            lock_poll,
            select: SelectOptions {
                mergeable_retries: self.mergeable_retries,
                concurrency: self.concurrency.max(1),
                ..SelectOptions::default()
            },
            sync: SyncOptions {
                fetch_depth: self.fetch_depth,
                committer_email: self.committer_email.clone(),
                committer_name: self.committer_name.clone(),
            },
            deployed_label_policy: if self.reprove_deployed {
                DeployedLabelPolicy::Reprove
            } else {
                DeployedLabelPolicy::Keep
            },
        })
    }
}

/// `owner/name` pair identifying a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySlug {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
}

impl FromStr for RepositorySlug {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once('/') {
            Some((owner, repo))
                if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(Error::Config(format!(
                "invalid repository '{s}', expected owner/name"
            ))),
        }
    }
}

impl std::fmt::Display for RepositorySlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PayloadBranch {
    #[serde(rename = "ref")]
    ref_field: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PayloadPullRequest {
    base: PayloadBranch,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PayloadOwner {
    login: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PayloadRepository {
    name: String,
    owner: PayloadOwner,
}

/// The parts of a webhook payload this tool reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    #[serde(rename = "ref")]
    ref_field: Option<String>,
    pull_request: Option<PayloadPullRequest>,
    repository: Option<PayloadRepository>,
}

/// A triggering event: its name and payload
#[derive(Debug, Clone, Default)]
pub struct TriggerEvent {
    /// Event name, e.g. `push` or `pull_request`
    pub name: String,
    /// Parsed payload
    pub payload: EventPayload,
}

impl TriggerEvent {
    /// Parse an event from its name and JSON payload
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            payload: serde_json::from_str(json)?,
        })
    }

    /// Read the payload file GitHub Actions points at
    pub fn load(name: impl Into<String>, path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Event(format!("failed to read event payload {}: {e}", path.display()))
        })?;
        Self::from_json(name, &json)
    }

    /// Base branch for this run, `None` for events the tool does not handle
    ///
    /// Pull request events use the PR's base branch; push events use the
    /// pushed branch.
    pub fn base_branch(&self) -> Option<String> {
        match self.name.as_str() {
            "pull_request" | "pull_request_target" => self
                .payload
                .pull_request
                .as_ref()
                .map(|pr| branch_from_ref(&pr.base.ref_field).to_string()),
            "push" if self.payload.repository.is_some() => self
                .payload
                .ref_field
                .as_deref()
                .filter(|r| !r.starts_with("refs/tags/"))
                .map(|r| branch_from_ref(r).to_string()),
            _ => None,
        }
    }

    /// Repository the event belongs to
    pub fn repository(&self) -> Option<RepositorySlug> {
        self.payload.repository.as_ref().map(|r| RepositorySlug {
            owner: r.owner.login.clone(),
            repo: r.name.clone(),
        })
    }
}

/// Branch name from a ref, dropping a leading `refs/heads/`
pub fn branch_from_ref(git_ref: &str) -> &str {
    git_ref.strip_prefix("refs/heads/").unwrap_or(git_ref)
}
