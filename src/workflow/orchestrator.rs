use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::ai::{AiProvider, LanguageModel};
use crate::codegen::{enhance_prompt, CodeGenerator};
use crate::credentials;
use crate::error::{AppError, Result};
use crate::platform::repository::RepositoryIdentity;
use crate::platform::Platform;
use crate::workflow::branch::BranchNamer;
use crate::workflow::pull_request::{pr_title, PullRequestReconciler};
use crate::workflow::types::{WorkflowRequest, WorkflowResult};
use crate::workspace::{WorkingCopy, WorkspaceProvider};

const FALLBACK_BASE_BRANCH: &str = "main";

/// Step of an execution, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Validating,
    BranchResolution,
    Cloning,
    Generating,
    Committing,
    ReconcilingPr,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::BranchResolution => "branch_resolution",
            Stage::Cloning => "cloning",
            Stage::Generating => "generating",
            Stage::Committing => "committing",
            Stage::ReconcilingPr => "reconciling_pr",
        };
        f.write_str(name)
    }
}

/// Inputs that passed validation.
struct Validated<'a> {
    prompt: &'a str,
    ai_key: &'a str,
    token: &'a str,
    repository_url: &'a str,
    provider: AiProvider,
    repo: RepositoryIdentity,
}

/// Runs prompt → branch → clone → generate → push → pull request.
pub struct WorkflowOrchestrator {
    platform: Arc<dyn Platform>,
    generator: Arc<dyn CodeGenerator>,
    workspaces: Arc<dyn WorkspaceProvider>,
    branch_namer: BranchNamer,
    reconciler: PullRequestReconciler,
}

impl WorkflowOrchestrator {
    pub fn new(
        platform: Arc<dyn Platform>,
        model: Arc<dyn LanguageModel>,
        generator: Arc<dyn CodeGenerator>,
        workspaces: Arc<dyn WorkspaceProvider>,
        description_max_tokens: u32,
    ) -> Self {
        Self {
            branch_namer: BranchNamer::new(model.clone()),
            reconciler: PullRequestReconciler::new(platform.clone(), model, description_max_tokens),
            platform,
            generator,
            workspaces,
        }
    }

    /// Run one workflow. Every failure, including validation, comes back as
    /// [`WorkflowResult::Failure`]. The working tree is disposed on every path.
    pub async fn execute(
        &self,
        request: &WorkflowRequest,
        cancel: &CancellationToken,
    ) -> WorkflowResult {
        tracing::info!(repo_url = %request.repository_url.trim(), "Starting workflow");

        let validated = match self.validate(request).await {
            Ok(validated) => validated,
            Err(e) => {
                tracing::warn!(stage = %Stage::Validating, error = %e, "Request rejected");
                return WorkflowResult::failure(e.to_string());
            }
        };

        let mut tree = self.workspaces.create();
        let mut stage = Stage::BranchResolution;
        let outcome = self
            .run(request, &validated, tree.as_mut(), &mut stage, cancel)
            .await;
        tree.dispose().await;

        match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    repo = %validated.repo,
                    stage = %stage,
                    error = %e,
                    "Workflow failed"
                );
                WorkflowResult::failure(e.to_string())
            }
        }
    }

    /// Checks run in a fixed order; only the last one touches the network.
    async fn validate<'a>(&self, request: &'a WorkflowRequest) -> Result<Validated<'a>> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(AppError::Validation("Prompt is required".into()));
        }
        let ai_key = request.ai_credential.trim();
        if ai_key.is_empty() {
            return Err(AppError::Validation(
                "API key is required. Provide it in the request or configure ai.api_key.".into(),
            ));
        }
        let repository_url = request.repository_url.trim();
        if repository_url.is_empty() {
            return Err(AppError::Validation("GitHub URL is required".into()));
        }
        let token = request.vcs_credential.trim();
        if token.is_empty() {
            return Err(AppError::Validation("GitHub token is required".into()));
        }

        let repo = RepositoryIdentity::parse(repository_url)
            .ok_or_else(|| AppError::Validation("Invalid GitHub URL format".into()))?;

        let provider = credentials::classify_ai_key(ai_key).ok_or_else(|| {
            AppError::Credential(
                "Invalid AI API key format. Use Anthropic (sk-ant-) or OpenAI (sk-) keys.".into(),
            )
        })?;

        if !credentials::validate_remote_token(self.platform.as_ref(), token).await {
            return Err(AppError::Credential("Invalid GitHub token".into()));
        }

        Ok(Validated {
            prompt,
            ai_key,
            token,
            repository_url,
            provider,
            repo,
        })
    }

    async fn run(
        &self,
        request: &WorkflowRequest,
        v: &Validated<'_>,
        tree: &mut dyn WorkingCopy,
        stage: &mut Stage,
        cancel: &CancellationToken,
    ) -> Result<WorkflowResult> {
        let model = request.model_override.as_deref();

        // Branch resolution
        let branch = match request
            .target_branch
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
        {
            Some(existing) => {
                tracing::info!(repo = %v.repo, branch = %existing, "Using existing branch");
                existing.to_string()
            }
            None => {
                let name = self
                    .branch_namer
                    .derive_name(v.provider, v.ai_key, v.prompt, model)
                    .await;
                self.create_branch(v.token, &v.repo, &name).await?;
                name
            }
        };

        *stage = Stage::Cloning;
        tree.clone_branch(v.repository_url, &branch, v.token).await?;

        *stage = Stage::Generating;
        let working_dir = tree
            .path()
            .ok_or_else(|| AppError::Workspace("Working tree has no directory".into()))?
            .to_path_buf();
        let prompt = enhance_prompt(v.prompt, &request.attached_files);
        let response = self
            .generator
            .generate(v.provider, v.ai_key, &prompt, &working_dir, model, cancel)
            .await?;
        tracing::info!(
            repo = %v.repo,
            branch = %branch,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Code generation complete"
        );

        *stage = Stage::Committing;
        let committed = tree
            .commit_and_push(&format!("AI Update: {}", v.prompt), &branch, v.token)
            .await?;
        if !committed {
            tracing::info!(branch = %branch, "Generator made no changes");
        }

        *stage = Stage::ReconcilingPr;
        let summary = tree.change_summary().await?;
        let body = self
            .reconciler
            .generate_description(v.provider, v.ai_key, v.prompt, &summary, model)
            .await;
        let pr = self
            .reconciler
            .reconcile(v.token, &v.repo, &pr_title(v.prompt), &body, &branch)
            .await?;

        tracing::info!(
            repo = %v.repo,
            branch = %branch,
            pr = pr.number,
            url = %pr.html_url,
            "Workflow complete"
        );

        Ok(WorkflowResult::Success {
            pull_request_url: pr.html_url,
            branch_name: branch,
            pull_request_number: pr.number,
            processed_at: Utc::now(),
            repository_name: v.repo.name.clone(),
            repository_owner: v.repo.owner.clone(),
        })
    }

    /// Create `branch` from the tip of the default branch.
    async fn create_branch(&self, token: &str, repo: &RepositoryIdentity, branch: &str) -> Result<()> {
        let base = match self.platform.default_branch(token, repo).await {
            Ok(base) => base,
            Err(e) => {
                tracing::warn!(repo = %repo, error = %e, "Default branch lookup failed, using main");
                FALLBACK_BASE_BRANCH.to_string()
            }
        };
        let sha = self.platform.branch_head_sha(token, repo, &base).await?;
        self.platform.create_branch(token, repo, branch, &sha).await?;
        tracing::info!(repo = %repo, branch = %branch, base = %base, "Branch created");
        Ok(())
    }
}
