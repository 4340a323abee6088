//! Authentication for GitHub
//!
//! Supports an explicit token, environment variables, and the `gh` CLI.

use crate::error::{Error, Result};
use tokio::process::Command;
use tracing::debug;

/// Environment variables checked for a token, in order
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Source of authentication token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Token passed on the command line or as an action input
    Explicit,
    /// Token from environment variable
    EnvVar,
    /// Token from the `gh` CLI
    Cli,
}

/// A resolved GitHub token
#[derive(Clone)]
pub struct GitHubAuthConfig {
    /// Access token
    pub token: String,
    /// Where the token came from
    pub source: AuthSource,
}

impl std::fmt::Debug for GitHubAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubAuthConfig")
            .field("token", &"***")
            .field("source", &self.source)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Resolve a token from an explicit value or the environment
///
/// Does not consult the `gh` CLI; see [`get_github_auth`].
pub fn resolve_token(
    explicit: Option<String>,
    env: impl Fn(&str) -> Option<String>,
) -> Option<GitHubAuthConfig> {
    if let Some(token) = non_empty(explicit) {
        return Some(GitHubAuthConfig {
            token,
            source: AuthSource::Explicit,
        });
    }

    TOKEN_ENV_VARS.iter().find_map(|var| {
        non_empty(env(var)).map(|token| GitHubAuthConfig {
            token,
            source: AuthSource::EnvVar,
        })
    })
}

async fn token_from_gh_cli(host: Option<&str>) -> Option<String> {
    let mut cmd = Command::new("gh");
    cmd.args(["auth", "token"]);
    if let Some(host) = host {
        cmd.args(["--hostname", host]);
    }

    match cmd.output().await {
        Ok(output) if output.status.success() => {
            non_empty(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
        }
        Ok(output) => {
            debug!(status = %output.status, "gh auth token failed");
            None
        }
        Err(e) => {
            debug!(error = %e, "gh CLI not available");
            None
        }
    }
}

/// Get a GitHub token: explicit, then `GITHUB_TOKEN`/`GH_TOKEN`, then `gh auth token`
pub async fn get_github_auth(
    explicit: Option<String>,
    host: Option<&str>,
) -> Result<GitHubAuthConfig> {
    if let Some(config) = resolve_token(explicit, |var| std::env::var(var).ok()) {
        debug!(source = ?config.source, "using GitHub token");
        return Ok(config);
    }

    if let Some(token) = token_from_gh_cli(host).await {
        debug!("using GitHub token from gh CLI");
        return Ok(GitHubAuthConfig {
            token,
            source: AuthSource::Cli,
        });
    }

    Err(Error::Auth(
        "no GitHub token found: pass --repo-token, set GITHUB_TOKEN, or run `gh auth login`"
            .to_string(),
    ))
}
