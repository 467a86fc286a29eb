pub mod github;
pub mod repository;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use repository::RepositoryIdentity;
use types::*;

/// Remote repository host. Every call is authenticated with the token it is
/// given; implementations must not cache clients across tokens.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Fetch the account the token belongs to.
    async fn authenticated_user(&self, token: &str) -> Result<AuthenticatedUser>;

    /// Name of the repository's default branch.
    async fn default_branch(&self, token: &str, repo: &RepositoryIdentity) -> Result<String>;

    /// Commit SHA at the tip of a branch.
    async fn branch_head_sha(
        &self,
        token: &str,
        repo: &RepositoryIdentity,
        branch: &str,
    ) -> Result<String>;

    /// Create `refs/heads/{branch}` pointing at `sha`.
    async fn create_branch(
        &self,
        token: &str,
        repo: &RepositoryIdentity,
        branch: &str,
        sha: &str,
    ) -> Result<()>;

    /// List all branches (first 100).
    async fn list_branches(&self, token: &str, repo: &RepositoryIdentity) -> Result<Vec<Branch>>;

    /// List open pull requests, optionally filtered by head (`owner:branch` or `branch`).
    async fn list_open_pulls(
        &self,
        token: &str,
        repo: &RepositoryIdentity,
        head: Option<&str>,
    ) -> Result<Vec<PullRequest>>;

    /// Create a pull request.
    async fn create_pull_request(
        &self,
        token: &str,
        repo: &RepositoryIdentity,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest>;
}
