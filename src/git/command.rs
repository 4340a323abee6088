//! `git` subprocess runner bound to one working directory

use crate::error::{Error, Result};
use crate::git::VersionControl;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;
use url::Url;

/// Name of the single remote every workspace uses
pub const REMOTE_NAME: &str = "origin";

/// Placeholder substituted for secrets in logs and errors
const REDACTED: &str = "***";

/// Credentials embedded into an HTTP(S) remote URL
#[derive(Clone)]
pub struct GitCredentials {
    /// Username (GitHub accepts any non-empty value alongside a token)
    pub username: String,
    /// Access token
    pub token: String,
}

impl std::fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("token", &REDACTED)
            .finish()
    }
}

/// Runs git subcommands in a fixed working directory
#[derive(Debug, Clone)]
pub struct GitCommandManager {
    working_directory: PathBuf,
    credentials: Option<GitCredentials>,
}

impl GitCommandManager {
    /// Create a manager for `working_directory`
    pub fn new(working_directory: impl Into<PathBuf>, credentials: Option<GitCredentials>) -> Self {
        Self {
            working_directory: working_directory.into(),
            credentials,
        }
    }

    /// Directory git runs in
    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    fn redact(&self, text: &str) -> String {
        match &self.credentials {
            Some(c) if !c.token.is_empty() => text.replace(&c.token, REDACTED),
            _ => text.to_string(),
        }
    }

    /// Run `git <args>` and return stdout split into lines
    async fn run(&self, args: &[&str]) -> Result<Vec<String>> {
        let redacted_command = self.redact(&args.join(" "));
        debug!(command = %redacted_command, cwd = %self.working_directory.display(), "running git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.working_directory)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Git {
                command: redacted_command,
                status: output.status.to_string(),
                stderr: self.redact(stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(ToString::to_string)
            .collect())
    }
}

/// Embed credentials into an HTTP(S) URL; other schemes pass through untouched
pub fn credentialed_url(url: &str, credentials: Option<&GitCredentials>) -> Result<String> {
    let Some(credentials) = credentials else {
        return Ok(url.to_string());
    };

    let mut parsed =
        Url::parse(url).map_err(|e| Error::Config(format!("invalid remote url '{url}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Ok(url.to_string());
    }

    parsed
        .set_username(&credentials.username)
        .and_then(|()| parsed.set_password(Some(&credentials.token)))
        .map_err(|()| Error::Config(format!("cannot embed credentials into '{url}'")))?;
    Ok(parsed.to_string())
}

/// Arguments for a restricted fetch of `refs`
fn fetch_args(depth: u32, refs: &[String]) -> Vec<String> {
    let mut args = vec!["fetch".to_string()];
    if depth > 0 {
        args.push(format!("--depth={depth}"));
    }
    args.extend(["--no-tags", "--prune", REMOTE_NAME].map(String::from));
    args.extend(refs.iter().cloned());
    args
}

#[async_trait]
impl VersionControl for GitCommandManager {
    async fn init(&self) -> Result<()> {
        self.run(&["init"]).await.map(drop)
    }

    async fn configure_identity(&self, email: &str, name: &str) -> Result<()> {
        self.run(&["config", "user.email", email]).await?;
        self.run(&["config", "user.name", name]).await.map(drop)
    }

    async fn add_remote(&self, url: &str) -> Result<()> {
        let remote_url = credentialed_url(url, self.credentials.as_ref())?;
        self.run(&["remote", "add", REMOTE_NAME, &remote_url])
            .await
            .map(drop)
    }

    async fn fetch(&self, depth: u32, refs: &[String]) -> Result<()> {
        let args = fetch_args(depth, refs);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&args).await.map(drop)
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        let upstream = super::remote_branch(branch);
        self.run(&["checkout", "-B", branch, &upstream, "--"])
            .await
            .map(drop)
    }

    async fn status(&self) -> Result<Vec<String>> {
        self.run(&["status"]).await
    }

    async fn hard_reset_to(&self, rev: &str) -> Result<()> {
        self.run(&["reset", "--hard", rev]).await.map(drop)
    }

    async fn merge_commit(&self, commit: &str, message: &str) -> Result<()> {
        self.run(&["merge", commit, "--no-ff", "--commit", "-m", message])
            .await
            .map(drop)
    }

    async fn abort_merge(&self) -> Result<()> {
        self.run(&["merge", "--abort"]).await.map(drop)
    }

    async fn diff_short_stat(&self, rev_a: &str, rev_b: &str) -> Result<Vec<String>> {
        self.run(&["diff", "--shortstat", rev_a, rev_b, "--"]).await
    }

    async fn force_push(&self, branch: &str) -> Result<()> {
        let refspec = format!("{branch}:refs/heads/{branch}");
        self.run(&["push", "--force", REMOTE_NAME, &refspec])
            .await
            .map(drop)
    }
}
