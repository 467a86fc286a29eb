use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::codegen::AttachedFile;

/// Everything one workflow execution needs. Credentials are already resolved.
#[derive(Clone, Default)]
pub struct WorkflowRequest {
    pub prompt: String,
    pub ai_credential: String,
    pub repository_url: String,
    pub vcs_credential: String,
    /// Existing branch to work on. Skips branch naming and creation.
    pub target_branch: Option<String>,
    pub attached_files: Vec<AttachedFile>,
    pub model_override: Option<String>,
}

// Manual Debug impl to keep credentials out of logs
impl std::fmt::Debug for WorkflowRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRequest")
            .field("prompt", &self.prompt)
            .field("ai_credential", &"[REDACTED]")
            .field("repository_url", &self.repository_url)
            .field("vcs_credential", &"[REDACTED]")
            .field("target_branch", &self.target_branch)
            .field(
                "attached_files",
                &self.attached_files.iter().map(|f| &f.name).collect::<Vec<_>>(),
            )
            .field("model_override", &self.model_override)
            .finish()
    }
}

/// Outcome of a workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowResult {
    Success {
        pull_request_url: String,
        branch_name: String,
        pull_request_number: u64,
        processed_at: DateTime<Utc>,
        repository_name: String,
        repository_owner: String,
    },
    Failure {
        message: String,
    },
}

impl WorkflowResult {
    pub fn failure(message: impl Into<String>) -> Self {
        WorkflowResult::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkflowResult::Success { .. })
    }
}
