use serde::{Deserialize, Serialize};

/// The account a token authenticates as.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub protected: bool,
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    pub title: String,
    /// Bare branch name of the head (`head.ref`).
    pub head_ref: String,
    /// `owner:branch` label of the head, when GitHub supplies one.
    pub head_label: Option<String>,
    pub base_ref: String,
}

#[derive(Debug, Clone)]
pub struct CreatePullRequest {
    pub title: String,
    pub body: String,
    pub head_branch: String,
    pub base_branch: String,
}
