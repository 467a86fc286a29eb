use std::time::Duration;

use async_trait::async_trait;
use octocrab::Octocrab;
use serde::Serialize;

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::platform::repository::RepositoryIdentity;
use crate::platform::types::*;
use crate::platform::Platform;

use super::mapper;

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
}

#[derive(Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: &'a str,
}

/// GitHub REST API via octocrab. Holds no credentials; a client is built for
/// each call from the token that call was given.
pub struct GitHubPlatform {
    api_base_url: Option<String>,
    request_timeout: Duration,
}

impl GitHubPlatform {
    pub fn new(config: &GitHubConfig) -> Self {
        Self {
            api_base_url: config.api_base_url.clone(),
            request_timeout: config.request_timeout(),
        }
    }

    /// Get an octocrab instance authenticated with a personal access token.
    fn client(&self, token: &str) -> Result<Octocrab> {
        let mut builder = Octocrab::builder()
            .personal_token(token.to_string())
            .set_connect_timeout(Some(self.request_timeout))
            .set_read_timeout(Some(self.request_timeout));

        if let Some(base) = &self.api_base_url {
            builder = builder
                .base_uri(base.as_str())
                .map_err(|e| AppError::Config(format!("Invalid GitHub API base URL: {e}")))?;
        }

        builder
            .build()
            .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))
    }
}

#[async_trait]
impl Platform for GitHubPlatform {
    async fn authenticated_user(&self, token: &str) -> Result<AuthenticatedUser> {
        let client = self.client(token)?;
        let user = client.current().user().await?;
        Ok(AuthenticatedUser { login: user.login })
    }

    async fn default_branch(&self, token: &str, repo: &RepositoryIdentity) -> Result<String> {
        let client = self.client(token)?;
        let repository = client.repos(&repo.owner, &repo.name).get().await?;
        repository.default_branch.ok_or_else(|| {
            AppError::GitHubApi(format!("Repository {repo} reports no default branch"))
        })
    }

    async fn branch_head_sha(
        &self,
        token: &str,
        repo: &RepositoryIdentity,
        branch: &str,
    ) -> Result<String> {
        let client = self.client(token)?;

        let url = format!("/repos/{}/{}/branches/{branch}", repo.owner, repo.name);
        let response: serde_json::Value = client
            .get(&url, None::<&()>)
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to get branch {branch}: {e}")))?;

        response["commit"]["sha"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::GitHubApi(format!("No commit SHA for branch {branch}")))
    }

    async fn create_branch(
        &self,
        token: &str,
        repo: &RepositoryIdentity,
        branch: &str,
        sha: &str,
    ) -> Result<()> {
        let client = self.client(token)?;

        let url = format!("/repos/{}/{}/git/refs", repo.owner, repo.name);
        let body = CreateRefBody {
            ref_name: format!("refs/heads/{branch}"),
            sha,
        };
        let _: serde_json::Value = client.post(&url, Some(&body)).await.map_err(|e| {
            AppError::GitHubApi(format!(
                "Failed to create branch {branch}: {}",
                crate::error::describe_github_error(&e)
            ))
        })?;

        Ok(())
    }

    async fn list_branches(&self, token: &str, repo: &RepositoryIdentity) -> Result<Vec<Branch>> {
        let client = self.client(token)?;

        let url = format!("/repos/{}/{}/branches", repo.owner, repo.name);
        let branches: Vec<serde_json::Value> = client
            .get(&url, Some(&PageParams { per_page: 100 }))
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to list branches: {e}")))?;

        Ok(branches.iter().map(mapper::map_branch).collect())
    }

    async fn list_open_pulls(
        &self,
        token: &str,
        repo: &RepositoryIdentity,
        head: Option<&str>,
    ) -> Result<Vec<PullRequest>> {
        let client = self.client(token)?;
        let pulls = client.pulls(&repo.owner, &repo.name);

        let mut request = pulls
            .list()
            .state(octocrab::params::State::Open)
            .per_page(100);
        if let Some(head) = head {
            request = request.head(head.to_string());
        }

        let page = request.send().await?;
        Ok(page.items.into_iter().map(mapper::map_pull_request).collect())
    }

    async fn create_pull_request(
        &self,
        token: &str,
        repo: &RepositoryIdentity,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest> {
        let client = self.client(token)?;

        let created = client
            .pulls(&repo.owner, &repo.name)
            .create(&pr.title, &pr.head_branch, &pr.base_branch)
            .body(&pr.body)
            .send()
            .await?;

        Ok(mapper::map_pull_request(created))
    }
}
