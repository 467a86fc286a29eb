pub mod git;
pub mod manager;

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

pub use manager::{WorkingTree, WorkspaceManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    NewFile,
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ChangeStatus::Added => "added",
            ChangeStatus::Modified => "modified",
            ChangeStatus::Deleted => "deleted",
            ChangeStatus::NewFile => "new file",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: String,
    pub status: ChangeStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub total_files: usize,
    pub changes: Vec<FileChange>,
}

impl ChangeSummary {
    pub fn new(changes: Vec<FileChange>) -> Self {
        Self {
            total_files: changes.len(),
            changes,
        }
    }

    /// One `status: path` line per change.
    pub fn changes_text(&self) -> String {
        self.changes
            .iter()
            .map(|c| format!("{}: {}", c.status, c.path))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A disposable local checkout of one branch, owned by one workflow execution.
#[async_trait]
pub trait WorkingCopy: Send + Sync {
    /// Clone `branch` of `repository_url`. Only one clone per instance.
    async fn clone_branch(&mut self, repository_url: &str, branch: &str, token: &str)
        -> Result<()>;

    /// Directory of the checkout, once cloned and until disposed.
    fn path(&self) -> Option<&Path>;

    /// Stage, commit and push everything. `Ok(false)` when there was nothing to commit.
    async fn commit_and_push(&mut self, message: &str, branch: &str, token: &str) -> Result<bool>;

    /// What changed since the clone, committed or not.
    async fn change_summary(&self) -> Result<ChangeSummary>;

    /// Remove the checkout. Idempotent; never fails.
    async fn dispose(&mut self);
}

/// Hands out a fresh working copy per workflow execution.
pub trait WorkspaceProvider: Send + Sync {
    fn create(&self) -> Box<dyn WorkingCopy>;
}
