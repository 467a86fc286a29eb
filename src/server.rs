use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ai::{HttpLanguageModel, LanguageModel};
use crate::codegen::{AttachedFile, CliCodeGenerator};
use crate::config::{AppConfig, CredentialDefaults, UploadConfig};
use crate::credentials;
use crate::error::{AppError, Result};
use crate::platform::github::GitHubPlatform;
use crate::platform::repository::RepositoryIdentity;
use crate::platform::types::Branch;
use crate::platform::Platform;
use crate::workflow::branch::{derive_from_prompt, BranchNamer};
use crate::workflow::pull_request::{pr_title, PullRequestReconciler};
use crate::workflow::{WorkflowOrchestrator, WorkflowRequest, WorkflowResult};
use crate::workspace::{ChangeSummary, WorkspaceManager};

/// Headroom for the JSON around the base64 payloads.
const BODY_OVERHEAD_BYTES: usize = 1024 * 1024;
const DEFAULT_BASE_BRANCH: &str = "main";
const PLAIN_PR_BODY: &str = "Auto-generated pull request";

pub struct AppState {
    pub config: AppConfig,
    pub platform: Arc<dyn Platform>,
    pub orchestrator: WorkflowOrchestrator,
    /// Standalone branch and pull request operations.
    pub branch_namer: BranchNamer,
    pub reconciler: PullRequestReconciler,
    pub credentials: CredentialDefaults,
    /// Cancelled on shutdown; every execution runs under a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig, shutdown: CancellationToken) -> Self {
        let platform: Arc<dyn Platform> = Arc::new(GitHubPlatform::new(&config.github));
        let model: Arc<dyn LanguageModel> = Arc::new(HttpLanguageModel::new(&config.ai));
        let orchestrator = WorkflowOrchestrator::new(
            platform.clone(),
            model.clone(),
            Arc::new(CliCodeGenerator::new(&config.codegen)),
            Arc::new(WorkspaceManager::new(&config.workspace)),
            config.ai.max_tokens,
        );
        Self::from_parts(config, platform, model, orchestrator, shutdown)
    }

    pub fn from_parts(
        config: AppConfig,
        platform: Arc<dyn Platform>,
        model: Arc<dyn LanguageModel>,
        orchestrator: WorkflowOrchestrator,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            credentials: config.credential_defaults(),
            branch_namer: BranchNamer::new(model.clone()),
            reconciler: PullRequestReconciler::new(platform.clone(), model, config.ai.max_tokens),
            config,
            platform,
            orchestrator,
            shutdown,
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = body_limit(&state.config.uploads);
    Router::new()
        .route("/api/execute", post(execute))
        .route("/api/branches", post(list_branches))
        .route("/api/create-branch", post(create_branch))
        .route("/api/create-pr", post(create_pull_request))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Largest request body: every upload at full size, base64 encoded.
fn body_limit(uploads: &UploadConfig) -> usize {
    uploads.max_files * uploads.max_file_bytes.div_ceil(3) * 4 + BODY_OVERHEAD_BYTES
}

async fn health_check() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

type ApiReply<T> = (StatusCode, Json<ApiResponse<T>>);

fn reject<T>(status: StatusCode, message: impl Into<String>) -> ApiReply<T> {
    (status, Json(ApiResponse::error(message)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteBody {
    #[serde(default)]
    pub prompt: String,
    pub api_key: Option<String>,
    #[serde(default)]
    pub github_url: String,
    pub github_token: Option<String>,
    pub branch: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub files: Vec<UploadedFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub name: String,
    pub content_base64: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteData {
    pub pull_request_url: String,
    pub branch_name: String,
    pub pull_request_number: u64,
    pub processed_at: DateTime<Utc>,
    pub repository_name: String,
    pub repository_owner: String,
}

async fn execute(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExecuteBody>,
) -> ApiReply<ExecuteData> {
    let attached_files = match decode_uploads(&body.files, &state.config.uploads) {
        Ok(files) => files,
        Err(e) => return reject(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let request = WorkflowRequest {
        prompt: body.prompt,
        ai_credential: state.credentials.resolve_ai_key(body.api_key.as_deref()),
        repository_url: body.github_url,
        vcs_credential: state
            .credentials
            .resolve_github_token(body.github_token.as_deref()),
        target_branch: body.branch,
        attached_files,
        model_override: body.model,
    };

    let cancel = state.shutdown.child_token();
    match state.orchestrator.execute(&request, &cancel).await {
        WorkflowResult::Success {
            pull_request_url,
            branch_name,
            pull_request_number,
            processed_at,
            repository_name,
            repository_owner,
        } => (
            StatusCode::OK,
            Json(ApiResponse::ok(
                "Pull request created successfully!",
                ExecuteData {
                    pull_request_url,
                    branch_name,
                    pull_request_number,
                    processed_at,
                    repository_name,
                    repository_owner,
                },
            )),
        ),
        WorkflowResult::Failure { message } => reject(StatusCode::BAD_REQUEST, message),
    }
}

/// Decode base64 uploads, enforcing the count and per-file size limits.
fn decode_uploads(files: &[UploadedFile], limits: &UploadConfig) -> Result<Vec<AttachedFile>> {
    if files.len() > limits.max_files {
        return Err(AppError::Validation(format!(
            "Too many files: at most {} may be attached",
            limits.max_files
        )));
    }

    files
        .iter()
        .map(|file| {
            let content = base64::engine::general_purpose::STANDARD
                .decode(file.content_base64.trim())
                .map_err(|e| {
                    AppError::Validation(format!("File '{}' is not valid base64: {e}", file.name))
                })?;
            if content.len() > limits.max_file_bytes {
                return Err(AppError::Validation(format!(
                    "File '{}' exceeds the {} byte limit",
                    file.name, limits.max_file_bytes
                )));
            }
            Ok(AttachedFile::new(file.name.clone(), content))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchesBody {
    #[serde(default)]
    pub github_url: String,
    pub github_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BranchesData {
    pub branches: Vec<Branch>,
}

async fn list_branches(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BranchesBody>,
) -> ApiReply<BranchesData> {
    let token = state
        .credentials
        .resolve_github_token(body.github_token.as_deref());
    if body.github_url.trim().is_empty() || token.is_empty() {
        return reject(
            StatusCode::BAD_REQUEST,
            "Missing required fields: githubUrl, githubToken",
        );
    }
    let Some(repo) = RepositoryIdentity::parse(body.github_url.trim()) else {
        return reject(StatusCode::BAD_REQUEST, "Invalid GitHub URL format");
    };

    match state.platform.list_branches(&token, &repo).await {
        Ok(branches) => {
            tracing::debug!(repo = %repo, count = branches.len(), "Branches listed");
            (
                StatusCode::OK,
                Json(ApiResponse::ok(
                    "Branches fetched successfully",
                    BranchesData { branches },
                )),
            )
        }
        Err(e) => {
            tracing::warn!(repo = %repo, error = %e, "Listing branches failed");
            reject(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBranchBody {
    #[serde(default)]
    pub prompt: String,
    pub api_key: Option<String>,
    #[serde(default)]
    pub github_url: String,
    pub github_token: Option<String>,
    pub base_branch: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBranchData {
    pub branch_name: String,
    pub branch_url: String,
    pub sha: String,
}

/// Name a branch for `prompt` and create it from `baseBranch`. Without an AI
/// key the name is derived from the prompt text alone.
async fn create_branch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBranchBody>,
) -> ApiReply<CreateBranchData> {
    let token = state
        .credentials
        .resolve_github_token(body.github_token.as_deref());
    let prompt = body.prompt.trim();
    if prompt.is_empty() || body.github_url.trim().is_empty() || token.is_empty() {
        return reject(
            StatusCode::BAD_REQUEST,
            "Missing required fields: prompt, githubUrl, githubToken",
        );
    }
    let Some(repo) = RepositoryIdentity::parse(body.github_url.trim()) else {
        return reject(StatusCode::BAD_REQUEST, "Invalid GitHub URL format");
    };

    let ai_key = state.credentials.resolve_ai_key(body.api_key.as_deref());
    let branch_name = if ai_key.is_empty() {
        derive_from_prompt(prompt)
    } else {
        let Some(provider) = credentials::classify_ai_key(&ai_key) else {
            return reject(StatusCode::BAD_REQUEST, "Invalid AI API key format");
        };
        state
            .branch_namer
            .derive_name(provider, &ai_key, prompt, body.model.as_deref())
            .await
    };

    let base = non_blank(body.base_branch.as_deref()).unwrap_or(DEFAULT_BASE_BRANCH);
    let created = async {
        let sha = state.platform.branch_head_sha(&token, &repo, base).await?;
        state
            .platform
            .create_branch(&token, &repo, &branch_name, &sha)
            .await?;
        Ok::<_, AppError>(sha)
    }
    .await;

    match created {
        Ok(sha) => {
            tracing::info!(repo = %repo, branch = %branch_name, base = %base, "Branch created");
            (
                StatusCode::OK,
                Json(ApiResponse::ok(
                    "Branch created successfully",
                    CreateBranchData {
                        branch_url: format!("https://github.com/{}/tree/{branch_name}", repo.full_name()),
                        branch_name,
                        sha,
                    },
                )),
            )
        }
        Err(e) => {
            tracing::warn!(repo = %repo, branch = %branch_name, error = %e, "Creating branch failed");
            reject(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePullRequestBody {
    pub prompt: Option<String>,
    pub api_key: Option<String>,
    #[serde(default)]
    pub github_url: String,
    pub github_token: Option<String>,
    #[serde(default)]
    pub branch_name: String,
    pub base_branch: Option<String>,
    pub title: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePullRequestData {
    pub pull_request_url: String,
    pub pull_request_number: u64,
    pub title: String,
    pub description: String,
}

/// Open (or find) the pull request for an existing branch. The description
/// is written by the model when both a prompt and an AI key are present.
async fn create_pull_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreatePullRequestBody>,
) -> ApiReply<CreatePullRequestData> {
    let token = state
        .credentials
        .resolve_github_token(body.github_token.as_deref());
    let branch = body.branch_name.trim();
    if body.github_url.trim().is_empty() || token.is_empty() || branch.is_empty() {
        return reject(
            StatusCode::BAD_REQUEST,
            "Missing required fields: githubUrl, githubToken, branchName",
        );
    }
    let Some(repo) = RepositoryIdentity::parse(body.github_url.trim()) else {
        return reject(StatusCode::BAD_REQUEST, "Invalid GitHub URL format");
    };

    let prompt = non_blank(body.prompt.as_deref());
    let title = match (non_blank(body.title.as_deref()), prompt) {
        (Some(title), _) => title.to_string(),
        (None, Some(prompt)) => pr_title(prompt),
        (None, None) => branch.to_string(),
    };

    let ai_key = state.credentials.resolve_ai_key(body.api_key.as_deref());
    let description = match (prompt, credentials::classify_ai_key(&ai_key)) {
        (Some(prompt), Some(provider)) => {
            state
                .reconciler
                .generate_description(
                    provider,
                    &ai_key,
                    prompt,
                    &ChangeSummary::default(),
                    body.model.as_deref(),
                )
                .await
        }
        (Some(_), None) if !ai_key.is_empty() => {
            return reject(StatusCode::BAD_REQUEST, "Invalid AI API key format");
        }
        _ => PLAIN_PR_BODY.to_string(),
    };

    let base = non_blank(body.base_branch.as_deref());
    match state
        .reconciler
        .reconcile_onto(&token, &repo, &title, &description, branch, base)
        .await
    {
        Ok(pr) => (
            StatusCode::OK,
            Json(ApiResponse::ok(
                "Pull request created successfully",
                CreatePullRequestData {
                    pull_request_url: pr.html_url,
                    pull_request_number: pr.number,
                    title: pr.title,
                    description,
                },
            )),
        ),
        Err(e) => {
            tracing::warn!(repo = %repo, branch = %branch, error = %e, "Opening pull request failed");
            reject(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        FakeCodeGenerator, FakeLanguageModel, FakePlatform, FakeWorkspaceProvider,
    };
    use crate::workspace::{ChangeStatus, FileChange};
    use base64::engine::general_purpose::STANDARD;

    fn state_with(config: AppConfig, platform: Arc<FakePlatform>) -> Arc<AppState> {
        state_with_model(
            config,
            platform,
            Arc::new(FakeLanguageModel::replying("feat/add-x")),
        )
    }

    fn state_with_model(
        config: AppConfig,
        platform: Arc<FakePlatform>,
        model: Arc<FakeLanguageModel>,
    ) -> Arc<AppState> {
        let orchestrator = WorkflowOrchestrator::new(
            platform.clone(),
            model.clone(),
            Arc::new(FakeCodeGenerator::new()),
            Arc::new(FakeWorkspaceProvider::new(vec![FileChange {
                path: "x.rs".into(),
                status: ChangeStatus::Added,
            }])),
            1024,
        );
        Arc::new(AppState::from_parts(
            config,
            platform,
            model,
            orchestrator,
            CancellationToken::new(),
        ))
    }

    fn body() -> ExecuteBody {
        ExecuteBody {
            prompt: "Add X".into(),
            api_key: Some("sk-ant-test".into()),
            github_url: "https://github.com/acme/widgets".into(),
            github_token: Some("ghp_test".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_execute_body_uses_camel_case() {
        let body: ExecuteBody = serde_json::from_value(serde_json::json!({
            "prompt": "Add X",
            "apiKey": "sk-ant-x",
            "githubUrl": "https://github.com/acme/widgets",
            "branch": "feat/existing",
            "files": [{ "name": "a.txt", "contentBase64": "aGk=" }]
        }))
        .unwrap();
        assert_eq!(body.api_key.as_deref(), Some("sk-ant-x"));
        assert_eq!(body.branch.as_deref(), Some("feat/existing"));
        assert!(body.github_token.is_none());
        assert_eq!(body.files[0].content_base64, "aGk=");
    }

    #[test]
    fn test_decode_uploads_limits() {
        let limits = UploadConfig {
            max_files: 1,
            max_file_bytes: 4,
        };
        let file = |name: &str, content: &[u8]| UploadedFile {
            name: name.into(),
            content_base64: STANDARD.encode(content),
        };

        let decoded = decode_uploads(&[file("a.txt", b"hi")], &limits).unwrap();
        assert_eq!(decoded, vec![AttachedFile::new("a.txt", "hi")]);

        let err = decode_uploads(&[file("a", b"1"), file("b", b"2")], &limits).unwrap_err();
        assert!(err.to_string().contains("Too many files"));

        let err = decode_uploads(&[file("big.bin", b"12345")], &limits).unwrap_err();
        assert!(err.to_string().contains("exceeds the 4 byte limit"));

        let bad = UploadedFile {
            name: "bad".into(),
            content_base64: "!!!".into(),
        };
        let err = decode_uploads(&[bad], &limits).unwrap_err();
        assert!(err.to_string().contains("not valid base64"));
    }

    #[test]
    fn test_body_limit_covers_base64_uploads() {
        let limits = UploadConfig::default();
        assert!(body_limit(&limits) > limits.max_files * limits.max_file_bytes * 4 / 3);
    }

    #[tokio::test]
    async fn test_execute_success_response() {
        let state = state_with(AppConfig::default(), Arc::new(FakePlatform::new()));
        let (status, Json(reply)) = execute(State(state), Json(body())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(reply.success);
        let data = reply.data.unwrap();
        assert_eq!(data.branch_name, "feat/add-x");
        assert_eq!(data.repository_owner, "acme");

        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("pullRequestUrl").is_some());
    }

    #[tokio::test]
    async fn test_execute_failure_is_bad_request() {
        let state = state_with(AppConfig::default(), Arc::new(FakePlatform::new()));
        let mut body = body();
        body.github_url = "not-a-url".into();
        let (status, Json(reply)) = execute(State(state), Json(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!reply.success);
        assert!(reply.message.contains("Invalid GitHub URL"));
        assert!(reply.data.is_none());
    }

    #[tokio::test]
    async fn test_execute_fills_missing_credentials_from_config() {
        let mut config = AppConfig::default();
        config.ai.api_key = Some("sk-ant-from-config".into());
        config.github.token = Some("ghp_from_config".into());
        let platform = Arc::new(FakePlatform::new());
        let state = state_with(config, platform.clone());

        let mut body = body();
        body.api_key = None;
        body.github_token = Some("  ".into());
        let (status, _) = execute(State(state), Json(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(platform.calls_named("authenticated_user"), 1);
    }

    #[tokio::test]
    async fn test_execute_without_any_token_is_rejected() {
        let platform = Arc::new(FakePlatform::new());
        let state = state_with(AppConfig::default(), platform.clone());
        let mut body = body();
        body.github_token = None;
        let (status, Json(reply)) = execute(State(state), Json(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(reply.message.contains("GitHub token is required"));
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_list_branches() {
        let platform = Arc::new(FakePlatform::new().with_branch("feat/existing"));
        let state = state_with(AppConfig::default(), platform);
        let (status, Json(reply)) = list_branches(
            State(state),
            Json(BranchesBody {
                github_url: "https://github.com/acme/widgets.git".into(),
                github_token: Some("ghp_test".into()),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<_> = reply
            .data
            .unwrap()
            .branches
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["main", "feat/existing"]);
    }

    #[tokio::test]
    async fn test_list_branches_requires_token() {
        let state = state_with(AppConfig::default(), Arc::new(FakePlatform::new()));
        let (status, Json(reply)) = list_branches(
            State(state),
            Json(BranchesBody {
                github_url: "https://github.com/acme/widgets".into(),
                github_token: None,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(reply.message.contains("Missing required fields"));
    }

    #[tokio::test]
    async fn test_create_branch_names_with_model() {
        let platform = Arc::new(FakePlatform::new().with_branch("develop"));
        let state = state_with(AppConfig::default(), platform.clone());
        let (status, Json(reply)) = create_branch(
            State(state),
            Json(CreateBranchBody {
                prompt: "Add X".into(),
                api_key: Some("sk-ant-test".into()),
                github_url: "https://github.com/acme/widgets".into(),
                github_token: Some("ghp_test".into()),
                base_branch: Some("develop".into()),
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", reply.message);
        let data = reply.data.unwrap();
        assert_eq!(data.branch_name, "feat/add-x");
        assert_eq!(data.sha, "develop-sha");
        assert_eq!(
            data.branch_url,
            "https://github.com/acme/widgets/tree/feat/add-x"
        );
        assert_eq!(
            platform.created_branches(),
            vec![("feat/add-x".to_string(), "develop-sha".to_string())]
        );
    }

    #[tokio::test]
    async fn test_create_branch_without_ai_key_uses_prompt_words() {
        let model = Arc::new(FakeLanguageModel::replying("feat/unused"));
        let platform = Arc::new(FakePlatform::new());
        let state = state_with_model(AppConfig::default(), platform.clone(), model.clone());
        let (status, Json(reply)) = create_branch(
            State(state),
            Json(CreateBranchBody {
                prompt: "Fix login redirect".into(),
                github_url: "https://github.com/acme/widgets".into(),
                github_token: Some("ghp_test".into()),
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", reply.message);
        let data = reply.data.unwrap();
        assert_eq!(data.branch_name, derive_from_prompt("Fix login redirect"));
        assert_eq!(data.sha, "base-sha");
        assert!(model.providers().is_empty());
    }

    #[tokio::test]
    async fn test_create_branch_existing_name_is_bad_gateway() {
        let platform = Arc::new(FakePlatform::new().with_branch("feat/add-x"));
        let state = state_with(AppConfig::default(), platform);
        let (status, Json(reply)) = create_branch(
            State(state),
            Json(CreateBranchBody {
                prompt: "Add X".into(),
                api_key: Some("sk-ant-test".into()),
                github_url: "https://github.com/acme/widgets".into(),
                github_token: Some("ghp_test".into()),
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(reply.message.contains("Reference already exists"));
    }

    #[tokio::test]
    async fn test_create_branch_requires_prompt() {
        let state = state_with(AppConfig::default(), Arc::new(FakePlatform::new()));
        let (status, Json(reply)) = create_branch(
            State(state),
            Json(CreateBranchBody {
                github_url: "https://github.com/acme/widgets".into(),
                github_token: Some("ghp_test".into()),
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(reply.message.contains("prompt, githubUrl, githubToken"));
    }

    #[tokio::test]
    async fn test_create_pr_with_model_description() {
        let model = Arc::new(FakeLanguageModel::replying("## Summary\nAdds X"));
        let platform = Arc::new(FakePlatform::new().with_branch("feat/add-x"));
        let state = state_with_model(AppConfig::default(), platform.clone(), model);
        let (status, Json(reply)) = create_pull_request(
            State(state),
            Json(CreatePullRequestBody {
                prompt: Some("Add X".into()),
                api_key: Some("sk-ant-test".into()),
                github_url: "https://github.com/acme/widgets".into(),
                github_token: Some("ghp_test".into()),
                branch_name: "feat/add-x".into(),
                base_branch: Some("release".into()),
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", reply.message);
        let data = reply.data.unwrap();
        assert_eq!(data.title, "AI-Generated Changes: Add X");
        assert_eq!(data.description, "## Summary\nAdds X");
        assert_eq!(data.pull_request_number, 1);

        let pulls = platform.open_pulls();
        assert_eq!(pulls[0].base_ref, "release");
        assert_eq!(pulls[0].head_ref, "feat/add-x");
    }

    #[tokio::test]
    async fn test_create_pr_without_prompt_uses_branch_and_plain_body() {
        let platform = Arc::new(FakePlatform::new());
        let state = state_with(AppConfig::default(), platform.clone());
        let request = || CreatePullRequestBody {
            github_url: "https://github.com/acme/widgets".into(),
            github_token: Some("ghp_test".into()),
            branch_name: "feat/manual".into(),
            ..Default::default()
        };

        let (status, Json(first)) = create_pull_request(State(state.clone()), Json(request())).await;
        assert_eq!(status, StatusCode::OK);
        let first = first.data.unwrap();
        assert_eq!(first.title, "feat/manual");
        assert_eq!(first.description, PLAIN_PR_BODY);

        // A second call finds the same pull request
        let (_, Json(second)) = create_pull_request(State(state), Json(request())).await;
        assert_eq!(second.data.unwrap().pull_request_number, first.pull_request_number);
        assert_eq!(platform.calls_named("create_pull_request"), 1);
    }

    #[tokio::test]
    async fn test_create_pr_requires_branch_name() {
        let state = state_with(AppConfig::default(), Arc::new(FakePlatform::new()));
        let (status, Json(reply)) = create_pull_request(
            State(state),
            Json(CreatePullRequestBody {
                github_url: "https://github.com/acme/widgets".into(),
                github_token: Some("ghp_test".into()),
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(reply.message.contains("branchName"));
    }
}
