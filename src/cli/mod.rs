//! Command-line surface
//!
//! Every flag falls back to an environment variable so the binary runs
//! unchanged as a GitHub Actions step.

pub mod context;
pub mod run;

use clap::Parser;
use merge_pr_to_branch::config::DeployConfig;
use std::path::PathBuf;
use tracing::Level;

/// Keep a deployment branch equal to base plus every requested pull request
#[derive(Debug, Parser)]
#[command(name = "merge-pr-to-branch", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub deploy: DeployConfig,

    /// Repository as owner/name; falls back to the event payload
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,

    /// GitHub token; falls back to GITHUB_TOKEN, GH_TOKEN, then `gh auth token`
    #[arg(long, env = "INPUT_REPO_TOKEN", hide_env_values = true)]
    pub repo_token: Option<String>,

    /// GitHub Enterprise hostname
    #[arg(long)]
    pub github_host: Option<String>,

    /// Name of the triggering event
    #[arg(long, env = "GITHUB_EVENT_NAME")]
    pub event_name: Option<String>,

    /// Path to the triggering event's JSON payload
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    pub event_path: Option<PathBuf>,

    /// User the token belongs to, used as the git username
    #[arg(long, env = "GITHUB_ACTOR")]
    pub actor: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Default log level when `RUST_LOG` is unset
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}
