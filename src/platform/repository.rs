use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

// https://<host>/<owner>/<repo>[.git][/]
static REPOSITORY_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://[A-Za-z0-9.-]+(?::\d+)?/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?/?$")
        .expect("repository URL pattern is valid")
});

/// Owner and name of a hosted repository, derived once from its URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryIdentity {
    pub owner: String,
    pub name: String,
}

impl RepositoryIdentity {
    /// Parse `https://host/owner/repo`, tolerating a trailing `.git` and/or `/`.
    ///
    /// Returns `None` for anything else; callers treat that as invalid input.
    pub fn parse(url: &str) -> Option<Self> {
        let captures = REPOSITORY_URL.captures(url.trim())?;
        let owner = captures.get(1)?.as_str();
        let name = captures.get(2)?.as_str();
        if is_dot_segment(owner) || is_dot_segment(name) {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Head filter used by the pulls API: `owner:branch`.
    pub fn head_ref(&self, branch: &str) -> String {
        format!("{}:{branch}", self.owner)
    }
}

impl std::fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn is_dot_segment(segment: &str) -> bool {
    segment.chars().all(|c| c == '.')
}
