//! In-memory git workspace
//!
//! Trees are modelled as (base revision, merged SHAs). The remote side is
//! shared through an `Arc` so several workspaces can push to the same
//! target branch.

use async_trait::async_trait;
use merge_pr_to_branch::error::{Error, Result};
use merge_pr_to_branch::git::VersionControl;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Call record for the mock workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    Init,
    ConfigureIdentity { email: String, name: String },
    AddRemote(String),
    Fetch { depth: u32, refs: Vec<String> },
    Checkout(String),
    Status,
    HardReset(String),
    Merge { commit: String, message: String },
    AbortMerge,
    DiffShortStat(String, String),
    ForcePush(String),
}

/// What the remote holds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteState {
    /// Revision of the base branch; bump to simulate new commits
    pub base_revision: u32,
    /// Base revision the published target was built on
    pub target_base: u32,
    /// SHAs merged into the published target, in order
    pub target_merges: Vec<String>,
    /// Number of force-pushes received
    pub pushes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Tree {
    base: u32,
    merges: Vec<String>,
}

/// Mock workspace with a shared remote
pub struct MockGit {
    remote: Arc<Mutex<RemoteState>>,
    head: Mutex<Tree>,
    calls: Mutex<Vec<GitCall>>,
    failing_merges: Mutex<HashSet<String>>,
    missing_refs: Mutex<HashSet<String>>,
    fail_abort: Mutex<bool>,
    fail_reset: Mutex<bool>,
    fail_push: Mutex<Option<String>>,
}

impl Default for MockGit {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGit {
    /// Workspace with its own empty remote
    pub fn new() -> Self {
        Self::with_remote(Arc::new(Mutex::new(RemoteState::default())))
    }

    /// Workspace pushing to `remote`
    pub fn with_remote(remote: Arc<Mutex<RemoteState>>) -> Self {
        Self {
            remote,
            head: Mutex::new(Tree::default()),
            calls: Mutex::new(Vec::new()),
            failing_merges: Mutex::new(HashSet::new()),
            missing_refs: Mutex::new(HashSet::new()),
            fail_abort: Mutex::new(false),
            fail_reset: Mutex::new(false),
            fail_push: Mutex::new(None),
        }
    }

    /// Handle to the shared remote
    pub fn remote(&self) -> Arc<Mutex<RemoteState>> {
        Arc::clone(&self.remote)
    }

    /// Snapshot of the remote
    pub fn remote_state(&self) -> RemoteState {
        self.remote.lock().unwrap().clone()
    }

    /// Simulate new commits landing on base
    pub fn advance_base(&self) {
        self.remote.lock().unwrap().base_revision += 1;
    }

    // === Error injection ===

    /// Make merging `sha` fail with a conflict
    pub fn fail_merge_of(&self, sha: &str) {
        self.failing_merges.lock().unwrap().insert(sha.to_string());
    }

    /// Make fetching `refname` fail as if the remote did not have it
    pub fn fail_fetch_of(&self, refname: &str) {
        self.missing_refs.lock().unwrap().insert(refname.to_string());
    }

    /// Make `merge --abort` fail
    pub fn fail_abort(&self) {
        *self.fail_abort.lock().unwrap() = true;
    }

    /// Make `reset --hard HEAD` fail
    pub fn fail_reset_to_head(&self) {
        *self.fail_reset.lock().unwrap() = true;
    }

    /// Make `push` fail
    pub fn fail_push(&self, msg: &str) {
        *self.fail_push.lock().unwrap() = Some(msg.to_string());
    }

    // === Inspection ===

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<GitCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Commits passed to `merge_commit`, in order
    pub fn merge_attempts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GitCall::Merge { commit, .. } => Some(commit),
                _ => None,
            })
            .collect()
    }

    /// Ref lists passed to `fetch`, in order
    pub fn fetched(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GitCall::Fetch { refs, .. } => Some(refs),
                _ => None,
            })
            .collect()
    }

    /// Number of `push` calls
    pub fn push_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GitCall::ForcePush(_)))
            .count()
    }

    fn record(&self, call: GitCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn git_error(command: &str, stderr: &str) -> Error {
        Error::Git {
            command: command.to_string(),
            status: "exit status: 1".to_string(),
            stderr: stderr.to_string(),
        }
    }

    fn remote_target(&self) -> Tree {
        let remote = self.remote.lock().unwrap();
        Tree {
            base: remote.target_base,
            merges: remote.target_merges.clone(),
        }
    }
}

#[async_trait]
impl VersionControl for MockGit {
    async fn init(&self) -> Result<()> {
        self.record(GitCall::Init);
        Ok(())
    }

    async fn configure_identity(&self, email: &str, name: &str) -> Result<()> {
        self.record(GitCall::ConfigureIdentity {
            email: email.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    async fn add_remote(&self, url: &str) -> Result<()> {
        self.record(GitCall::AddRemote(url.to_string()));
        Ok(())
    }

    async fn fetch(&self, depth: u32, refs: &[String]) -> Result<()> {
        self.record(GitCall::Fetch {
            depth,
            refs: refs.to_vec(),
        });
        let missing = self.missing_refs.lock().unwrap();
        if let Some(refname) = refs.iter().find(|r| missing.contains(*r)) {
            return Err(Self::git_error(
                "fetch",
                &format!("fatal: couldn't find remote ref {refname}"),
            ));
        }
        Ok(())
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        self.record(GitCall::Checkout(branch.to_string()));
        *self.head.lock().unwrap() = self.remote_target();
        Ok(())
    }

    async fn status(&self) -> Result<Vec<String>> {
        self.record(GitCall::Status);
        Ok(vec!["nothing to commit, working tree clean".to_string()])
    }

    async fn hard_reset_to(&self, rev: &str) -> Result<()> {
        self.record(GitCall::HardReset(rev.to_string()));
        if rev == "HEAD" {
            if *self.fail_reset.lock().unwrap() {
                return Err(Self::git_error("reset --hard HEAD", "index.lock exists"));
            }
            return Ok(());
        }

        let tree = if rev.ends_with(super::TARGET) {
            self.remote_target()
        } else {
            Tree {
                base: self.remote.lock().unwrap().base_revision,
                merges: Vec::new(),
            }
        };
        *self.head.lock().unwrap() = tree;
        Ok(())
    }

    async fn merge_commit(&self, commit: &str, message: &str) -> Result<()> {
        self.record(GitCall::Merge {
            commit: commit.to_string(),
            message: message.to_string(),
        });
        if self.failing_merges.lock().unwrap().contains(commit) {
            return Err(Self::git_error(
                &format!("merge {commit}"),
                "CONFLICT (content): Merge conflict in README.md",
            ));
        }
        self.head.lock().unwrap().merges.push(commit.to_string());
        Ok(())
    }

    async fn abort_merge(&self) -> Result<()> {
        self.record(GitCall::AbortMerge);
        if *self.fail_abort.lock().unwrap() {
            return Err(Self::git_error("merge --abort", "no merge to abort"));
        }
        Ok(())
    }

    async fn diff_short_stat(&self, rev_a: &str, rev_b: &str) -> Result<Vec<String>> {
        self.record(GitCall::DiffShortStat(rev_a.to_string(), rev_b.to_string()));
        if *self.head.lock().unwrap() == self.remote_target() {
            Ok(Vec::new())
        } else {
            Ok(vec![" 1 file changed, 1 insertion(+)".to_string()])
        }
    }

    async fn force_push(&self, branch: &str) -> Result<()> {
        self.record(GitCall::ForcePush(branch.to_string()));
        if let Some(msg) = self.fail_push.lock().unwrap().as_ref() {
            return Err(Self::git_error("push", msg));
        }
        let head = self.head.lock().unwrap().clone();
        let mut remote = self.remote.lock().unwrap();
        remote.target_base = head.base;
        remote.target_merges = head.merges;
        remote.pushes += 1;
        Ok(())
    }
}
