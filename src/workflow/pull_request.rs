use std::sync::Arc;

use crate::ai::prompt::pr_description_prompt;
use crate::ai::{AiProvider, CompletionRequest, LanguageModel};
use crate::error::{AppError, Result};
use crate::platform::repository::RepositoryIdentity;
use crate::platform::types::{CreatePullRequest, PullRequest};
use crate::platform::Platform;
use crate::workspace::ChangeSummary;

const TITLE_PROMPT_CHARS: usize = 50;
const FALLBACK_BASE_BRANCH: &str = "main";
const DESCRIPTION_TEMPERATURE: f32 = 0.3;
const ALREADY_EXISTS: &str = "a pull request already exists";

/// `AI-Generated Changes: ` plus the first 50 characters of the prompt.
pub fn pr_title(prompt: &str) -> String {
    let head: String = prompt.chars().take(TITLE_PROMPT_CHARS).collect();
    let ellipsis = if prompt.chars().count() > TITLE_PROMPT_CHARS {
        "..."
    } else {
        ""
    };
    format!("AI-Generated Changes: {head}{ellipsis}")
}

/// Finds or opens the one pull request for a branch.
pub struct PullRequestReconciler {
    platform: Arc<dyn Platform>,
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
}

impl PullRequestReconciler {
    pub fn new(platform: Arc<dyn Platform>, model: Arc<dyn LanguageModel>, max_tokens: u32) -> Self {
        Self {
            platform,
            model,
            max_tokens,
        }
    }

    /// Return the open pull request for `branch`, creating it if there is none.
    ///
    /// Creation losing a race to another request is resolved by looking the
    /// pull request up again.
    pub async fn reconcile(
        &self,
        token: &str,
        repo: &RepositoryIdentity,
        title: &str,
        body: &str,
        branch: &str,
    ) -> Result<PullRequest> {
        self.reconcile_onto(token, repo, title, body, branch, None).await
    }

    /// Like [`reconcile`](Self::reconcile), but a new pull request targets
    /// `base` when given instead of the repository's default branch.
    pub async fn reconcile_onto(
        &self,
        token: &str,
        repo: &RepositoryIdentity,
        title: &str,
        body: &str,
        branch: &str,
        base: Option<&str>,
    ) -> Result<PullRequest> {
        let head = repo.head_ref(branch);
        if let Some(existing) = self
            .platform
            .list_open_pulls(token, repo, Some(&head))
            .await
            .map_err(|e| AppError::PullRequest(e.to_string()))?
            .into_iter()
            .next()
        {
            tracing::info!(pr = existing.number, branch = %branch, "Pull request already open");
            return Ok(existing);
        }

        let base = match base {
            Some(base) => Ok(base.to_string()),
            None => self.platform.default_branch(token, repo).await,
        };
        let base = match base {
            Ok(base) => base,
            Err(e) => {
                tracing::warn!(
                    repo = %repo,
                    error = %e,
                    "Could not look up default branch, using {FALLBACK_BASE_BRANCH}"
                );
                FALLBACK_BASE_BRANCH.to_string()
            }
        };

        let request = CreatePullRequest {
            title: title.to_string(),
            body: body.to_string(),
            head_branch: branch.to_string(),
            base_branch: base,
        };

        match self.platform.create_pull_request(token, repo, &request).await {
            Ok(pr) => {
                tracing::info!(pr = pr.number, url = %pr.html_url, "Pull request created");
                Ok(pr)
            }
            Err(e) if e.to_string().to_lowercase().contains(ALREADY_EXISTS) => {
                tracing::info!(branch = %branch, "Pull request created concurrently, looking it up");
                match self.find_existing(token, repo, branch).await {
                    Some(pr) => Ok(pr),
                    None => Err(AppError::PullRequest(e.to_string())),
                }
            }
            Err(e) => Err(AppError::PullRequest(e.to_string())),
        }
    }

    /// Head filters first, then a scan of every open pull request. Lookup
    /// errors count as not found. The scan skips same-named branches on forks.
    async fn find_existing(
        &self,
        token: &str,
        repo: &RepositoryIdentity,
        branch: &str,
    ) -> Option<PullRequest> {
        for head in [repo.head_ref(branch), branch.to_string()] {
            match self.platform.list_open_pulls(token, repo, Some(&head)).await {
                Ok(pulls) => {
                    if let Some(pr) = pulls.into_iter().next() {
                        return Some(pr);
                    }
                }
                Err(e) => {
                    tracing::warn!(head = %head, error = %e, "Pull request lookup failed");
                }
            }
        }

        match self.platform.list_open_pulls(token, repo, None).await {
            Ok(pulls) => {
                let label = repo.head_ref(branch);
                pulls.into_iter().find(|pr| {
                    pr.head_ref == branch
                        && pr.head_label.as_deref().map_or(true, |l| l == label)
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Listing open pull requests failed");
                None
            }
        }
    }

    /// Ask the model for a description of the change. Falls back to a plain
    /// listing when the model fails or answers with nothing.
    pub async fn generate_description(
        &self,
        provider: AiProvider,
        api_key: &str,
        prompt: &str,
        summary: &ChangeSummary,
        model_override: Option<&str>,
    ) -> String {
        let request = CompletionRequest {
            prompt: pr_description_prompt(prompt, summary.total_files, &summary.changes_text()),
            model: model_override.map(str::to_string),
            max_tokens: self.max_tokens,
            temperature: DESCRIPTION_TEMPERATURE,
        };

        match self.model.complete(provider, api_key, &request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                response.content.trim().to_string()
            }
            Ok(_) => {
                tracing::warn!("Model returned an empty description, using fallback");
                fallback_description(prompt, summary)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Description request failed, using fallback");
                fallback_description(prompt, summary)
            }
        }
    }
}

fn fallback_description(prompt: &str, summary: &ChangeSummary) -> String {
    let mut body = format!("## Summary\n\n{prompt}\n\n## Changes ({})\n\n", summary.total_files);
    if summary.changes.is_empty() {
        body.push_str("No file changes were detected.\n");
    } else {
        for change in &summary.changes {
            body.push_str(&format!("- `{}` ({})\n", change.path, change.status));
        }
    }
    body
}
