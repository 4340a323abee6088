//! In-memory repository host

use async_trait::async_trait;
use merge_pr_to_branch::error::{Error, Result};
use merge_pr_to_branch::platform::RepositoryHost;
use merge_pr_to_branch::types::{BranchRef, Mergeable, PlatformConfig, PullRequestRecord};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// One call made against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    GetBranch(String),
    /// `created` is false when the call failed
    CreateBranch {
        branch: String,
        from: String,
        created: bool,
    },
    DeleteBranch(String),
    ListPullRequests(String),
    GetPullRequest(u64),
    AddLabel(u64, String),
    RemoveLabel(u64, String),
    Comment(u64, String),
}

impl HostCall {
    /// Whether the call changes a PR's labels or comments
    pub fn is_pr_mutation(&self) -> bool {
        matches!(
            self,
            Self::AddLabel(..) | Self::RemoveLabel(..) | Self::Comment(..)
        )
    }

    /// PR the call touches, if any
    pub fn pr_number(&self) -> Option<u64> {
        match self {
            Self::GetPullRequest(n)
            | Self::AddLabel(n, _)
            | Self::RemoveLabel(n, _)
            | Self::Comment(n, _) => Some(*n),
            _ => None,
        }
    }
}

/// Mock repository host backed by maps
///
/// Branch creation is atomic under one mutex, so it doubles as a real lock.
/// Label mutations update the stored PRs, so consecutive runs see each
/// other's effects.
///
/// Features:
/// - Branch refs, PRs and labels kept in memory
/// - Configurable listing order and lazily computed mergeability
/// - Call tracking for verification
/// - Error injection for failure path testing
pub struct MockRepositoryHost {
    config: PlatformConfig,
    remote_url: Mutex<String>,
    branches: Mutex<BTreeMap<String, String>>,
    prs: Mutex<BTreeMap<u64, PullRequestRecord>>,
    listing_order: Mutex<Option<Vec<u64>>>,
    pending_mergeability: Mutex<HashMap<u64, u32>>,
    comments: Mutex<Vec<(u64, String)>>,
    calls: Mutex<Vec<HostCall>>,
    // Error injection
    error_on_list: Mutex<Option<String>>,
    error_on_get_pr: Mutex<Option<String>>,
    error_on_create_branch: Mutex<Option<String>>,
    error_on_delete_branch: Mutex<Option<String>>,
    error_on_comment: Mutex<Option<String>>,
}

impl MockRepositoryHost {
    /// Create an empty host with the given config
    pub fn with_config(config: PlatformConfig) -> Self {
        let remote_url = format!("https://github.com/{}/{}.git", config.owner, config.repo);
        Self {
            config,
            remote_url: Mutex::new(remote_url),
            branches: Mutex::new(BTreeMap::new()),
            prs: Mutex::new(BTreeMap::new()),
            listing_order: Mutex::new(None),
            pending_mergeability: Mutex::new(HashMap::new()),
            comments: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            error_on_list: Mutex::new(None),
            error_on_get_pr: Mutex::new(None),
            error_on_create_branch: Mutex::new(None),
            error_on_delete_branch: Mutex::new(None),
            error_on_comment: Mutex::new(None),
        }
    }

    // === Setup ===

    /// Point the clone URL somewhere else (e.g. a local bare repository)
    pub fn set_remote_url(&self, url: &str) {
        *self.remote_url.lock().unwrap() = url.to_string();
    }

    /// Create or move a branch
    pub fn set_branch(&self, name: &str, sha: &str) {
        self.branches
            .lock()
            .unwrap()
            .insert(name.to_string(), sha.to_string());
    }

    /// Add an open PR; its `mergeable` is what detail fetches report
    pub fn add_pr(&self, pr: PullRequestRecord) {
        self.prs.lock().unwrap().insert(pr.number, pr);
    }

    /// Return PRs from the listing in this order instead of by number
    pub fn set_listing_order(&self, order: &[u64]) {
        *self.listing_order.lock().unwrap() = Some(order.to_vec());
    }

    /// Report `Unknown` for the next `fetches` detail fetches of a PR
    pub fn delay_mergeability(&self, pr_number: u64, fetches: u32) {
        self.pending_mergeability
            .lock()
            .unwrap()
            .insert(pr_number, fetches);
    }

    /// Change what detail fetches report for a PR
    pub fn set_mergeable(&self, pr_number: u64, mergeable: Mergeable) {
        if let Some(pr) = self.prs.lock().unwrap().get_mut(&pr_number) {
            pr.mergeable = mergeable;
        }
    }

    // === Error injection ===

    /// Make `list_pull_requests` fail
    pub fn fail_list(&self, msg: &str) {
        *self.error_on_list.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `get_pull_request` fail
    pub fn fail_get_pr(&self, msg: &str) {
        *self.error_on_get_pr.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `create_branch` fail with something other than a conflict
    pub fn fail_create_branch(&self, msg: &str) {
        *self.error_on_create_branch.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `delete_branch` fail
    pub fn fail_delete_branch(&self, msg: &str) {
        *self.error_on_delete_branch.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `create_comment` fail
    pub fn fail_comment(&self, msg: &str) {
        *self.error_on_comment.lock().unwrap() = Some(msg.to_string());
    }

    // === Inspection ===

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Label and comment mutations so far
    pub fn pr_mutations(&self) -> Vec<HostCall> {
        self.calls()
            .into_iter()
            .filter(HostCall::is_pr_mutation)
            .collect()
    }

    /// Calls touching one PR
    pub fn calls_for(&self, pr_number: u64) -> Vec<HostCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.pr_number() == Some(pr_number))
            .collect()
    }

    /// Comment bodies posted on a PR
    pub fn comments_for(&self, pr_number: u64) -> Vec<String> {
        self.comments
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| *n == pr_number)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Current labels of a PR
    pub fn labels_of(&self, pr_number: u64) -> Vec<String> {
        self.prs
            .lock()
            .unwrap()
            .get(&pr_number)
            .map(|pr| pr.labels.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a branch currently exists
    pub fn has_branch(&self, name: &str) -> bool {
        self.branches.lock().unwrap().contains_key(name)
    }

    /// Successful creates and deletes of `branch`, as `true`/`false`
    pub fn branch_lifecycle(&self, branch: &str) -> Vec<bool> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::CreateBranch {
                    branch: b,
                    created: true,
                    ..
                } if b == branch => Some(true),
                HostCall::DeleteBranch(b) if b == branch => Some(false),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn injected(slot: &Mutex<Option<String>>) -> Result<()> {
        match slot.lock().unwrap().as_ref() {
            Some(msg) => Err(Error::Platform(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RepositoryHost for MockRepositoryHost {
    async fn get_branch_ref(&self, branch: &str) -> Result<Option<BranchRef>> {
        self.record(HostCall::GetBranch(branch.to_string()));
        Ok(self
            .branches
            .lock()
            .unwrap()
            .get(branch)
            .map(|sha| BranchRef {
                name: branch.to_string(),
                sha: sha.clone(),
            }))
    }

    async fn create_branch(&self, branch: &str, from_branch: &str) -> Result<BranchRef> {
        Self::injected(&self.error_on_create_branch)?;

        let mut branches = self.branches.lock().unwrap();
        let result = if branches.contains_key(branch) {
            Err(Error::RefConflict(branch.to_string()))
        } else {
            match branches.get(from_branch).cloned() {
                Some(sha) => {
                    branches.insert(branch.to_string(), sha.clone());
                    Ok(BranchRef {
                        name: branch.to_string(),
                        sha,
                    })
                }
                None => Err(Error::BaseBranchMissing(from_branch.to_string())),
            }
        };
        self.record(HostCall::CreateBranch {
            branch: branch.to_string(),
            from: from_branch.to_string(),
            created: result.is_ok(),
        });
        result
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        self.record(HostCall::DeleteBranch(branch.to_string()));
        Self::injected(&self.error_on_delete_branch)?;
        self.branches.lock().unwrap().remove(branch);
        Ok(())
    }

    async fn list_pull_requests(&self, base: &str) -> Result<Vec<PullRequestRecord>> {
        self.record(HostCall::ListPullRequests(base.to_string()));
        Self::injected(&self.error_on_list)?;

        let prs = self.prs.lock().unwrap();
        let numbers: Vec<u64> = match self.listing_order.lock().unwrap().as_ref() {
            Some(order) => order.clone(),
            None => prs.keys().copied().collect(),
        };
        Ok(numbers
            .iter()
            .filter_map(|n| prs.get(n))
            .map(|pr| PullRequestRecord {
                mergeable: Mergeable::Unknown,
                ..pr.clone()
            })
            .collect())
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequestRecord> {
        self.record(HostCall::GetPullRequest(number));
        Self::injected(&self.error_on_get_pr)?;

        let mut pr = self
            .prs
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .ok_or_else(|| Error::Platform(format!("no PR #{number}")))?;

        let mut pending = self.pending_mergeability.lock().unwrap();
        if let Some(remaining) = pending.get_mut(&number).filter(|r| **r > 0) {
            *remaining -= 1;
            pr.mergeable = Mergeable::Unknown;
        }
        Ok(pr)
    }

    async fn add_label(&self, number: u64, label: &str) -> Result<()> {
        self.record(HostCall::AddLabel(number, label.to_string()));
        if let Some(pr) = self.prs.lock().unwrap().get_mut(&number) {
            pr.labels.insert(label.to_string());
        }
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        self.record(HostCall::RemoveLabel(number, label.to_string()));
        if let Some(pr) = self.prs.lock().unwrap().get_mut(&number) {
            pr.labels.remove(label);
        }
        Ok(())
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<()> {
        self.record(HostCall::Comment(number, body.to_string()));
        Self::injected(&self.error_on_comment)?;
        self.comments
            .lock()
            .unwrap()
            .push((number, body.to_string()));
        Ok(())
    }

    fn remote_url(&self) -> String {
        self.remote_url.lock().unwrap().clone()
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
