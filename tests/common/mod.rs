//! Shared test utilities

#![allow(dead_code)]

mod mock_git;
mod mock_host;

pub use git_repo::{TempGitRemote, git};
pub use mock_git::{GitCall, MockGit, RemoteState};
pub use mock_host::{HostCall, MockRepositoryHost};

use chrono::{DateTime, TimeZone, Utc};
use merge_pr_to_branch::deploy::{DeployOptions, SelectOptions};
use merge_pr_to_branch::retry::PollPolicy;
use merge_pr_to_branch::types::{Mergeable, PlatformConfig, PullRequestRecord};
use std::time::Duration;

pub const BASE: &str = "main";
pub const TARGET: &str = "staging";

/// Config for the in-memory repository
pub fn github_config() -> PlatformConfig {
    PlatformConfig {
        owner: "test".to_string(),
        repo: "repo".to_string(),
        host: None,
    }
}

/// Creation time `minutes` after a fixed epoch
pub fn created(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

/// A PR record with sha `sha-{number}` and head ref `pr-{number}`
pub fn make_pr(number: u64, labels: &[&str], mergeable: Mergeable) -> PullRequestRecord {
    PullRequestRecord {
        number,
        head_sha: format!("sha-{number}"),
        head_ref: format!("pr-{number}"),
        labels: labels.iter().map(ToString::to_string).collect(),
        mergeable,
        created_at: Some(created(number as i64)),
    }
}

/// Options that never sleep for long
pub fn fast_options() -> DeployOptions {
    let mut options = DeployOptions::new(BASE, TARGET);
    options.lock_poll = PollPolicy::bounded(50, Duration::from_millis(5));
    options.select = SelectOptions {
        mergeable_retry_interval: Duration::ZERO,
        ..SelectOptions::default()
    };
    options
}

/// Host with base and target branches present
pub fn seeded_host() -> MockRepositoryHost {
    let host = MockRepositoryHost::with_config(github_config());
    host.set_branch(BASE, "base-sha");
    host.set_branch(TARGET, "target-sha");
    host
}
