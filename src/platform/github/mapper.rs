use crate::platform::types;

/// Map octocrab PullRequest to our platform PullRequest type.
pub fn map_pull_request(pr: octocrab::models::pulls::PullRequest) -> types::PullRequest {
    types::PullRequest {
        number: pr.number,
        html_url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
        title: pr.title.unwrap_or_default(),
        head_ref: pr.head.ref_field.clone(),
        head_label: pr.head.label.clone(),
        base_ref: pr.base.ref_field.clone(),
    }
}

/// Map a raw `GET /repos/{owner}/{repo}/branches` entry.
pub fn map_branch(value: &serde_json::Value) -> types::Branch {
    types::Branch {
        name: value["name"].as_str().unwrap_or_default().to_string(),
        protected: value["protected"].as_bool().unwrap_or(false),
        sha: value["commit"]["sha"].as_str().unwrap_or_default().to_string(),
    }
}
