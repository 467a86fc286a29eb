use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::WorkspaceConfig;
use crate::error::{AppError, Result};
use crate::platform::repository::RepositoryIdentity;
use crate::workspace::{git, ChangeSummary, WorkingCopy, WorkspaceProvider};

const BOT_NAME: &str = "AutoPR Bot";
const BOT_EMAIL: &str = "autopr[bot]@users.noreply.github.com";

/// Manages workspace directories for workflow executions.
pub struct WorkspaceManager {
    base_dir: PathBuf,
}

impl WorkspaceManager {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            base_dir: config.base_dir.clone(),
        }
    }
}

impl WorkspaceProvider for WorkspaceManager {
    fn create(&self) -> Box<dyn WorkingCopy> {
        Box::new(WorkingTree::new(&self.base_dir))
    }
}

enum TreeState {
    Unbound,
    Cloned {
        path: PathBuf,
        branch: String,
        base_commit: String,
        commits: u32,
    },
    Disposed,
}

/// One scratch checkout: `Unbound -> Cloned -> (Committed)* -> Disposed`.
///
/// Dropping a tree that was cloned but never disposed still removes its
/// directory.
pub struct WorkingTree {
    base_dir: PathBuf,
    state: TreeState,
}

impl WorkingTree {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            state: TreeState::Unbound,
        }
    }

    /// Number of commits made since the clone.
    pub fn commits(&self) -> u32 {
        match &self.state {
            TreeState::Cloned { commits, .. } => *commits,
            _ => 0,
        }
    }

    /// Private directory for one execution: repository, branch, random suffix.
    fn scratch_path(&self, repository_url: &str, branch: &str) -> PathBuf {
        let safe_repo = RepositoryIdentity::parse(repository_url)
            .map(|r| format!("{}__{}", r.owner, r.name))
            .unwrap_or_else(|| "repo".to_string());
        let safe_branch = branch.replace('/', "__");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        self.base_dir
            .join(format!("{safe_repo}__{safe_branch}__{}", &suffix[..12]))
    }

    fn cloned(&self) -> Result<(&Path, &str, &str)> {
        match &self.state {
            TreeState::Cloned {
                path,
                branch,
                base_commit,
                ..
            } => Ok((path.as_path(), branch.as_str(), base_commit.as_str())),
            TreeState::Unbound => Err(AppError::Workspace(
                "Working tree has not been cloned".to_string(),
            )),
            TreeState::Disposed => Err(AppError::Workspace(
                "Working tree has been disposed".to_string(),
            )),
        }
    }

    /// Clone from any URL git2 understands. `clone_branch` restricts this to HTTPS.
    async fn clone_from(&mut self, url: &str, branch: &str, token: &str) -> Result<()> {
        if !matches!(self.state, TreeState::Unbound) {
            return Err(AppError::Workspace(
                "Working tree is already bound; create a new one per execution".to_string(),
            ));
        }

        let path = self.scratch_path(url, branch);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to create workspace dir: {e}")))?;
        }

        // Record the path first so a half-finished clone is still cleaned up
        self.state = TreeState::Cloned {
            path: path.clone(),
            branch: branch.to_string(),
            base_commit: String::new(),
            commits: 0,
        };

        let base_commit = git::clone_branch(url, &path, branch, token).await?;
        git::configure_identity(&path, BOT_NAME, BOT_EMAIL).await?;

        tracing::info!(branch = %branch, path = %path.display(), "Repository cloned");

        if let TreeState::Cloned {
            base_commit: slot, ..
        } = &mut self.state
        {
            *slot = base_commit;
        }
        Ok(())
    }
}

#[async_trait]
impl WorkingCopy for WorkingTree {
    async fn clone_branch(
        &mut self,
        repository_url: &str,
        branch: &str,
        token: &str,
    ) -> Result<()> {
        if !repository_url.starts_with("https://") {
            return Err(AppError::Clone(format!(
                "Expected HTTPS clone URL, got: {repository_url}"
            )));
        }
        self.clone_from(repository_url, branch, token).await
    }

    fn path(&self) -> Option<&Path> {
        self.cloned().ok().map(|(path, _, _)| path)
    }

    async fn commit_and_push(&mut self, message: &str, branch: &str, token: &str) -> Result<bool> {
        let (path, cloned_branch, _) = self.cloned()?;
        if branch != cloned_branch {
            return Err(AppError::Workspace(format!(
                "Working tree holds branch '{cloned_branch}', not '{branch}'"
            )));
        }
        let path = path.to_path_buf();

        let changed = git::changed_path_count(&path).await?;
        if changed == 0 {
            tracing::info!(branch = %branch, "No changes to commit");
            return Ok(false);
        }

        git::add_all(&path).await?;
        let Some(commit_id) = git::commit(&path, message).await? else {
            tracing::info!(branch = %branch, "Staged tree matches HEAD, nothing to commit");
            return Ok(false);
        };
        git::push(&path, branch, token).await?;

        if let TreeState::Cloned { commits, .. } = &mut self.state {
            *commits += 1;
        }

        tracing::info!(
            branch = %branch,
            files = changed,
            commit = %commit_id,
            "Changes committed and pushed"
        );
        Ok(true)
    }

    async fn change_summary(&self) -> Result<ChangeSummary> {
        let (path, _, base_commit) = self.cloned()?;
        let changes = git::changes_since(path, base_commit).await?;
        Ok(ChangeSummary::new(changes))
    }

    async fn dispose(&mut self) {
        let state = std::mem::replace(&mut self.state, TreeState::Disposed);
        if let TreeState::Cloned { path, .. } = state {
            if path.exists() {
                match tokio::fs::remove_dir_all(&path).await {
                    Ok(()) => tracing::info!(path = %path.display(), "Workspace cleaned up"),
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to clean up workspace"
                    ),
                }
            }
        }
    }
}

impl Drop for WorkingTree {
    fn drop(&mut self) {
        if let TreeState::Cloned { path, .. } = &self.state {
            if path.exists() {
                tracing::warn!(path = %path.display(), "Working tree dropped without dispose");
                if let Err(e) = std::fs::remove_dir_all(path) {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to clean up workspace");
                }
            }
        }
    }
}
