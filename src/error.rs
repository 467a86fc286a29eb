use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("AI provider error: {0}")]
    Ai(String),

    #[error("Failed to clone repository: {0}")]
    Clone(String),

    #[error("Code generation failed: {0}")]
    Generation(String),

    #[error("Failed to push changes: {0}")]
    Push(String),

    #[error("Failed to create pull request: {0}")]
    PullRequest(String),

    #[error("Git operation failed: {0}")]
    Git(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<octocrab::Error> for AppError {
    fn from(e: octocrab::Error) -> Self {
        AppError::GitHubApi(describe_github_error(&e))
    }
}

impl From<git2::Error> for AppError {
    fn from(e: git2::Error) -> Self {
        AppError::Git(e.message().to_string())
    }
}

/// Render an octocrab error including GitHub's validation details.
///
/// A 422 from GitHub carries the useful part ("A pull request already exists
/// for ...") in `errors`, not in the top-level message.
pub fn describe_github_error(e: &octocrab::Error) -> String {
    match e {
        octocrab::Error::GitHub { source, .. } => {
            let details = source
                .errors
                .as_ref()
                .map(|errors| {
                    errors
                        .iter()
                        .map(|err| match err.get("message").and_then(|m| m.as_str()) {
                            Some(message) => message.to_string(),
                            None => err.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .unwrap_or_default();
            if details.is_empty() {
                source.message.clone()
            } else {
                format!("{}: {details}", source.message)
            }
        }
        other => other.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
