//! Hand-written fakes for the trait seams, shared by unit tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::ai::{AiProvider, AiResponse, CompletionRequest, LanguageModel, TokenUsage};
use crate::codegen::CodeGenerator;
use crate::error::{AppError, Result};
use crate::platform::repository::RepositoryIdentity;
use crate::platform::types::*;
use crate::platform::Platform;
use crate::workspace::{ChangeSummary, FileChange, WorkingCopy, WorkspaceProvider};

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

struct StoredPull {
    pr: PullRequest,
    /// Only visible to unfiltered listings.
    hidden: bool,
}

#[derive(Default)]
struct PlatformState {
    calls: Vec<String>,
    branches: Vec<Branch>,
    created_branches: Vec<(String, String)>,
    pulls: Vec<StoredPull>,
    next_pr: u64,
}

/// In-memory GitHub. Records every call by method name.
pub struct FakePlatform {
    state: Mutex<PlatformState>,
    invalid_token: bool,
    default_branch: Option<String>,
    already_exists_on_create: bool,
    pull_listing_fails: bool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PlatformState {
                branches: vec![Branch {
                    name: "main".into(),
                    protected: true,
                    sha: "base-sha".into(),
                }],
                next_pr: 1,
                ..Default::default()
            }),
            invalid_token: false,
            default_branch: Some("main".into()),
            already_exists_on_create: false,
            pull_listing_fails: false,
        }
    }

    pub fn with_invalid_token(mut self) -> Self {
        self.invalid_token = true;
        self
    }

    pub fn with_default_branch(mut self, name: &str) -> Self {
        self.default_branch = Some(name.to_string());
        self.add_branch(name);
        self
    }

    pub fn with_default_branch_error(mut self) -> Self {
        self.default_branch = None;
        self
    }

    pub fn with_branch(self, name: &str) -> Self {
        self.add_branch(name);
        self
    }

    /// An open pull request that head-filtered listings do not return.
    pub fn with_hidden_pull(self, branch: &str, number: u64) -> Self {
        self.state.lock().unwrap().pulls.push(StoredPull {
            pr: pull(number, branch, "main"),
            hidden: true,
        });
        self
    }

    /// A hidden open pull request from a fork that uses the same branch name.
    pub fn with_hidden_fork_pull(self, branch: &str, number: u64) -> Self {
        let mut pr = pull(number, branch, "main");
        pr.head_label = Some(format!("someone-else:{branch}"));
        self.state.lock().unwrap().pulls.push(StoredPull { pr, hidden: true });
        self
    }

    pub fn with_pull_listing_error(mut self) -> Self {
        self.pull_listing_fails = true;
        self
    }

    /// Creation fails the way GitHub reports a duplicate pull request.
    pub fn with_already_exists_on_create(mut self) -> Self {
        self.already_exists_on_create = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_named(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.as_str() == name)
            .count()
    }

    /// `(branch, sha)` pairs passed to `create_branch`.
    pub fn created_branches(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().created_branches.clone()
    }

    pub fn open_pulls(&self) -> Vec<PullRequest> {
        self.state
            .lock()
            .unwrap()
            .pulls
            .iter()
            .map(|p| p.pr.clone())
            .collect()
    }

    fn add_branch(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        if !state.branches.iter().any(|b| b.name == name) {
            state.branches.push(Branch {
                name: name.to_string(),
                protected: false,
                sha: format!("{name}-sha"),
            });
        }
    }

    fn record(&self, call: &str) {
        self.state.lock().unwrap().calls.push(call.to_string());
    }
}

fn pull(number: u64, branch: &str, base: &str) -> PullRequest {
    PullRequest {
        number,
        html_url: format!("https://github.com/acme/widgets/pull/{number}"),
        title: format!("PR {number}"),
        head_ref: branch.to_string(),
        head_label: Some(format!("acme:{branch}")),
        base_ref: base.to_string(),
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn authenticated_user(&self, _token: &str) -> Result<AuthenticatedUser> {
        self.record("authenticated_user");
        if self.invalid_token {
            return Err(AppError::GitHubApi("Bad credentials".into()));
        }
        Ok(AuthenticatedUser {
            login: "octocat".into(),
        })
    }

    async fn default_branch(&self, _token: &str, _repo: &RepositoryIdentity) -> Result<String> {
        self.record("default_branch");
        self.default_branch
            .clone()
            .ok_or_else(|| AppError::GitHubApi("Not Found".into()))
    }

    async fn branch_head_sha(
        &self,
        _token: &str,
        _repo: &RepositoryIdentity,
        branch: &str,
    ) -> Result<String> {
        self.record("branch_head_sha");
        self.state
            .lock()
            .unwrap()
            .branches
            .iter()
            .find(|b| b.name == branch)
            .map(|b| b.sha.clone())
            .ok_or_else(|| AppError::GitHubApi(format!("Branch not found: {branch}")))
    }

    async fn create_branch(
        &self,
        _token: &str,
        _repo: &RepositoryIdentity,
        branch: &str,
        sha: &str,
    ) -> Result<()> {
        self.record("create_branch");
        let mut state = self.state.lock().unwrap();
        if state.branches.iter().any(|b| b.name == branch) {
            return Err(AppError::GitHubApi("Reference already exists".into()));
        }
        state.branches.push(Branch {
            name: branch.to_string(),
            protected: false,
            sha: sha.to_string(),
        });
        state
            .created_branches
            .push((branch.to_string(), sha.to_string()));
        Ok(())
    }

    async fn list_branches(&self, _token: &str, _repo: &RepositoryIdentity) -> Result<Vec<Branch>> {
        self.record("list_branches");
        Ok(self.state.lock().unwrap().branches.clone())
    }

    async fn list_open_pulls(
        &self,
        _token: &str,
        _repo: &RepositoryIdentity,
        head: Option<&str>,
    ) -> Result<Vec<PullRequest>> {
        self.record("list_open_pulls");
        if self.pull_listing_fails {
            return Err(AppError::GitHubApi("Server Error".into()));
        }
        let state = self.state.lock().unwrap();
        let pulls = state
            .pulls
            .iter()
            .filter(|p| match head {
                None => true,
                Some(head) => {
                    !p.hidden
                        && (p.pr.head_label.as_deref() == Some(head) || p.pr.head_ref == head)
                }
            })
            .map(|p| p.pr.clone())
            .collect();
        Ok(pulls)
    }

    async fn create_pull_request(
        &self,
        _token: &str,
        repo: &RepositoryIdentity,
        request: &CreatePullRequest,
    ) -> Result<PullRequest> {
        self.record("create_pull_request");
        if self.already_exists_on_create {
            return Err(AppError::GitHubApi(format!(
                "Validation Failed: A pull request already exists for {}.",
                repo.head_ref(&request.head_branch)
            )));
        }
        let mut state = self.state.lock().unwrap();
        let number = state.next_pr;
        state.next_pr += 1;
        let mut pr = pull(number, &request.head_branch, &request.base_branch);
        pr.title = request.title.clone();
        state.pulls.push(StoredPull {
            pr: pr.clone(),
            hidden: false,
        });
        Ok(pr)
    }
}

// ---------------------------------------------------------------------------
// Language model
// ---------------------------------------------------------------------------

/// Answers every completion with the same text, or fails every time.
pub struct FakeLanguageModel {
    reply: std::result::Result<String, String>,
    requests: Mutex<Vec<(AiProvider, CompletionRequest)>>,
}

impl FakeLanguageModel {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().map(|(_, r)| r.clone())
    }

    pub fn providers(&self) -> Vec<AiProvider> {
        self.requests.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }
}

#[async_trait]
impl LanguageModel for FakeLanguageModel {
    async fn complete(
        &self,
        provider: AiProvider,
        _api_key: &str,
        request: &CompletionRequest,
    ) -> Result<AiResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((provider, request.clone()));
        match &self.reply {
            Ok(text) => Ok(AiResponse {
                content: text.clone(),
                usage: TokenUsage::new(10, 5),
            }),
            Err(message) => Err(AppError::Ai(message.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Code generator
// ---------------------------------------------------------------------------

/// Records what it was asked to do instead of running a tool.
#[derive(Default)]
pub struct FakeCodeGenerator {
    failure: Option<String>,
    prompts: Mutex<Vec<(AiProvider, String, PathBuf)>>,
}

impl FakeCodeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// `(provider, prompt, working_dir)` per call.
    pub fn invocations(&self) -> Vec<(AiProvider, String, PathBuf)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeGenerator for FakeCodeGenerator {
    async fn generate(
        &self,
        provider: AiProvider,
        _api_key: &str,
        prompt: &str,
        working_dir: &Path,
        _model: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<AiResponse> {
        self.prompts
            .lock()
            .unwrap()
            .push((provider, prompt.to_string(), working_dir.to_path_buf()));
        match &self.failure {
            Some(message) => Err(AppError::Generation(message.clone())),
            None => Ok(AiResponse {
                content: "done".into(),
                usage: TokenUsage::default(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// Everything the fake working copies did, shared with the test.
#[derive(Debug, Default, Clone)]
pub struct WorkspaceLog {
    pub clones: Vec<(String, String)>,
    pub commits: Vec<(String, String)>,
    pub created: usize,
    pub disposed: usize,
}

#[derive(Clone)]
pub struct FakeWorkspaceProvider {
    log: Arc<Mutex<WorkspaceLog>>,
    fail_clone: bool,
    changes: Vec<FileChange>,
}

impl FakeWorkspaceProvider {
    pub fn new(changes: Vec<FileChange>) -> Self {
        Self {
            log: Arc::default(),
            fail_clone: false,
            changes,
        }
    }

    pub fn failing_clone(mut self) -> Self {
        self.fail_clone = true;
        self
    }

    pub fn log(&self) -> WorkspaceLog {
        self.log.lock().unwrap().clone()
    }
}

impl WorkspaceProvider for FakeWorkspaceProvider {
    fn create(&self) -> Box<dyn WorkingCopy> {
        self.log.lock().unwrap().created += 1;
        Box::new(FakeWorkingCopy {
            log: self.log.clone(),
            fail_clone: self.fail_clone,
            changes: self.changes.clone(),
            path: None,
            disposed: false,
        })
    }
}

struct FakeWorkingCopy {
    log: Arc<Mutex<WorkspaceLog>>,
    fail_clone: bool,
    changes: Vec<FileChange>,
    path: Option<PathBuf>,
    disposed: bool,
}

#[async_trait]
impl WorkingCopy for FakeWorkingCopy {
    async fn clone_branch(&mut self, repository_url: &str, branch: &str, _token: &str) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .clones
            .push((repository_url.to_string(), branch.to_string()));
        if self.fail_clone {
            return Err(AppError::Clone(format!("branch '{branch}': not found")));
        }
        self.path = Some(PathBuf::from("/tmp/autopr-fake").join(branch.replace('/', "__")));
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn commit_and_push(&mut self, message: &str, branch: &str, _token: &str) -> Result<bool> {
        if self.changes.is_empty() {
            return Ok(false);
        }
        self.log
            .lock()
            .unwrap()
            .commits
            .push((message.to_string(), branch.to_string()));
        Ok(true)
    }

    async fn change_summary(&self) -> Result<ChangeSummary> {
        Ok(ChangeSummary::new(self.changes.clone()))
    }

    async fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.path = None;
            self.log.lock().unwrap().disposed += 1;
        }
    }
}
