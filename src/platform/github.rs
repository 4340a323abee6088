//! GitHub repository host implementation

use crate::error::{Error, Result};
use crate::platform::RepositoryHost;
use crate::types::{BranchRef, Mergeable, PlatformConfig, PullRequestRecord};
use async_trait::async_trait;
use octocrab::Octocrab;
use octocrab::models::repos::Object;
use octocrab::params::repos::Reference;
use tracing::debug;

/// Page size for pull request listings
const PER_PAGE: u8 = 100;

/// GitHub service using octocrab
pub struct GitHubService {
    client: Octocrab,
    config: PlatformConfig,
}

impl GitHubService {
    /// Create a new GitHub service
    ///
    /// `host` selects a GitHub Enterprise instance; `None` targets github.com.
    pub fn new(token: &str, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let base_uri = host.as_ref().map(|h| format!("https://{h}/api/v3"));
        Self::build(token, owner, repo, host, base_uri.as_deref())
    }

    /// Create a service against an explicit API base URI
    ///
    /// Used for API proxies and local test servers.
    pub fn with_base_uri(token: &str, owner: String, repo: String, base_uri: &str) -> Result<Self> {
        Self::build(token, owner, repo, None, Some(base_uri))
    }

    fn build(
        token: &str,
        owner: String,
        repo: String,
        host: Option<String>,
        base_uri: Option<&str>,
    ) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token.to_string());
        if let Some(uri) = base_uri {
            builder = builder
                .base_uri(uri)
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
        }

        let client = builder
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        Ok(Self {
            client,
            config: PlatformConfig { owner, repo, host },
        })
    }

    fn branch(name: &str) -> Reference {
        Reference::Branch(name.to_string())
    }
}

/// HTTP status and message of a GitHub error response, if that is what `err` is
fn github_status(err: &octocrab::Error) -> Option<(u16, &str)> {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            Some((source.status_code.as_u16(), source.message.as_str()))
        }
        _ => None,
    }
}

/// Whether a ref lookup/delete error means the ref is absent
///
/// GitHub answers a delete of a missing ref with 422 "Reference does not
/// exist" rather than 404.
fn is_missing_ref(err: &octocrab::Error) -> bool {
    match github_status(err) {
        Some((404, _)) => true,
        Some((422, message)) => message.contains("does not exist"),
        _ => false,
    }
}

/// Whether a ref creation error means the ref already exists
fn is_ref_conflict(err: &octocrab::Error) -> bool {
    matches!(github_status(err), Some((422, message)) if message.contains("already exists"))
}

fn sha_from_object(object: Object) -> Result<String> {
    match object {
        Object::Commit { sha, .. } | Object::Tag { sha, .. } => Ok(sha),
        #[allow(unreachable_patterns)]
        _ => Err(Error::GitHubApi("ref points at an unsupported object".to_string())),
    }
}

/// Helper to convert an octocrab PR to our `PullRequestRecord`
fn record_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PullRequestRecord {
    PullRequestRecord {
        number: pr.number,
        head_sha: pr.head.sha.clone(),
        head_ref: pr.head.ref_field.clone(),
        labels: pr
            .labels
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|l| l.name.clone())
            .collect(),
        mergeable: Mergeable::from_flag(pr.mergeable),
        created_at: pr.created_at,
    }
}

#[async_trait]
impl RepositoryHost for GitHubService {
    async fn get_branch_ref(&self, branch: &str) -> Result<Option<BranchRef>> {
        debug!(branch, "getting branch ref");
        let result = self
            .client
            .repos(&self.config.owner, &self.config.repo)
            .get_ref(&Self::branch(branch))
            .await;

        match result {
            Ok(r) => {
                let sha = sha_from_object(r.object)?;
                debug!(branch, %sha, "resolved branch ref");
                Ok(Some(BranchRef {
                    name: branch.to_string(),
                    sha,
                }))
            }
            Err(e) if is_missing_ref(&e) => {
                debug!(branch, "branch ref not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_branch(&self, branch: &str, from_branch: &str) -> Result<BranchRef> {
        let source = self
            .get_branch_ref(from_branch)
            .await?
            .ok_or_else(|| Error::BaseBranchMissing(from_branch.to_string()))?;

        debug!(branch, from_branch, sha = %source.sha, "creating branch");
        let created = self
            .client
            .repos(&self.config.owner, &self.config.repo)
            .create_ref(&Self::branch(branch), source.sha.clone())
            .await
            .map_err(|e| {
                if is_ref_conflict(&e) {
                    Error::RefConflict(branch.to_string())
                } else {
                    Error::GitHubApi(format!("failed to create branch '{branch}': {e}"))
                }
            })?;

        debug!(branch, "created branch");
        Ok(BranchRef {
            name: branch.to_string(),
            sha: sha_from_object(created.object)?,
        })
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "deleting branch");
        match self
            .client
            .repos(&self.config.owner, &self.config.repo)
            .delete_ref(&Self::branch(branch))
            .await
        {
            Ok(()) => {
                debug!(branch, "deleted branch");
                Ok(())
            }
            Err(e) if is_missing_ref(&e) => {
                debug!(branch, "branch already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_pull_requests(&self, base: &str) -> Result<Vec<PullRequestRecord>> {
        debug!(base, "listing open PRs");
        let pagination_error = |page: u32, e: octocrab::Error| Error::Pagination {
            page,
            message: e.to_string(),
        };

        let mut page_number = 1;
        let mut page = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .list()
            .state(octocrab::params::State::Open)
            .base(base)
            .sort(octocrab::params::pulls::Sort::Created)
            .direction(octocrab::params::Direction::Ascending)
            .per_page(PER_PAGE)
            .send()
            .await
            .map_err(|e| pagination_error(page_number, e))?;

        let mut records = Vec::new();
        loop {
            records.extend(page.items.iter().map(record_from_octocrab));
            page_number += 1;
            let next = self
                .client
                .get_page::<octocrab::models::pulls::PullRequest>(&page.next)
                .await
                .map_err(|e| pagination_error(page_number, e))?;
            match next {
                Some(p) => page = p,
                None => break,
            }
        }

        // Detail fetch is the only authoritative source
        for record in &mut records {
            record.mergeable = Mergeable::Unknown;
        }

        debug!(base, count = records.len(), pages = page_number - 1, "listed open PRs");
        Ok(records)
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequestRecord> {
        debug!(pr_number = number, "getting PR");
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(number)
            .await?;

        let record = record_from_octocrab(&pr);
        debug!(pr_number = number, mergeable = %record.mergeable, "got PR");
        Ok(record)
    }

    async fn add_label(&self, number: u64, label: &str) -> Result<()> {
        debug!(pr_number = number, label, "adding label");
        self.client
            .issues(&self.config.owner, &self.config.repo)
            .add_labels(number, &[label.to_string()])
            .await?;
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        debug!(pr_number = number, label, "removing label");
        match self
            .client
            .issues(&self.config.owner, &self.config.repo)
            .remove_label(number, label)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if matches!(github_status(&e), Some((404, _))) => {
                debug!(pr_number = number, label, "label already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<()> {
        debug!(pr_number = number, "creating PR comment");
        self.client
            .issues(&self.config.owner, &self.config.repo)
            .create_comment(number, body)
            .await?;
        debug!(pr_number = number, "created PR comment");
        Ok(())
    }

    fn remote_url(&self) -> String {
        let host = self.config.host.as_deref().unwrap_or("github.com");
        format!("https://{host}/{}/{}.git", self.config.owner, self.config.repo)
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
