use std::path::Path;

use git2::{
    build::RepoBuilder, Cred, Delta, DiffOptions, FetchOptions, IndexAddOption, Oid,
    PushOptions, RemoteCallbacks, Repository, StatusOptions,
};

use crate::error::{AppError, Result};
use crate::workspace::{ChangeStatus, FileChange};

/// Validate a branch name to prevent argument injection.
/// Rejects names starting with `-` as defence in depth.
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AppError::Git("Branch name is empty".to_string()));
    }
    if name.starts_with('-') {
        return Err(AppError::Git(format!(
            "Invalid branch name (starts with '-'): {name}"
        )));
    }
    Ok(())
}

/// Remote callbacks that authenticate with the token.
/// The token is captured by the closure and never written to disk.
fn credential_callbacks(token: &str) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username_from_url, _allowed_types| {
        Cred::userpass_plaintext("x-access-token", token)
    });
    callbacks
}

/// Build `FetchOptions` that authenticate via credential callback.
fn make_fetch_options(token: &str) -> FetchOptions<'_> {
    let mut opts = FetchOptions::new();
    opts.remote_callbacks(credential_callbacks(token));
    opts
}

/// Clone only `branch` of a repository into the target directory and check it out.
///
/// The remote URL stored in `.git/config` is the plain URL; authentication
/// is handled via credential callback only. Returns the checked-out commit.
pub async fn clone_branch(url: &str, target: &Path, branch: &str, token: &str) -> Result<String> {
    validate_branch_name(branch)?;

    let url = url.to_string();
    let target = target.to_path_buf();
    let branch = branch.to_string();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || {
        let refspec_branch = branch.clone();
        let mut builder = RepoBuilder::new();
        builder
            .fetch_options(make_fetch_options(&token))
            .branch(&branch)
            .remote_create(move |repo, name, url| {
                let refspec =
                    format!("+refs/heads/{refspec_branch}:refs/remotes/{name}/{refspec_branch}");
                repo.remote_with_fetch(name, url, &refspec)
            });

        let repo = builder
            .clone(&url, &target)
            .map_err(|e| AppError::Clone(format!("branch '{branch}': {}", e.message())))?;

        let head = repo.head()?.peel_to_commit()?;
        Ok(head.id().to_string())
    })
    .await
    .map_err(|e| AppError::Clone(format!("Clone task panicked: {e}")))?
}

/// Set the local commit identity.
pub async fn configure_identity(dir: &Path, name: &str, email: &str) -> Result<()> {
    let dir = dir.to_path_buf();
    let name = name.to_string();
    let email = email.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut config = repo.config()?;
        config.set_str("user.name", &name)?;
        config.set_str("user.email", &email)?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Configure-identity task panicked: {e}")))?
}

/// Stage all changes, including deletions.
pub async fn add_all(dir: &Path) -> Result<()> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut index = repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Add-all task panicked: {e}")))?
}

/// Commit the index with the configured identity. Returns the new commit id,
/// or `None` when the index tree matches HEAD and nothing was committed.
pub async fn commit(dir: &Path, message: &str) -> Result<Option<String>> {
    let dir = dir.to_path_buf();
    let message = message.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let sig = repo.signature()?;
        let mut index = repo.index()?;
        let tree_oid = index.write_tree()?;
        let tree = repo.find_tree(tree_oid)?;
        let parent = repo.head()?.peel_to_commit()?;
        if parent.tree_id() == tree_oid {
            return Ok(None);
        }
        let oid = repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&parent])?;
        Ok(Some(oid.to_string()))
    })
    .await
    .map_err(|e| AppError::Git(format!("Commit task panicked: {e}")))?
}

/// Push the current branch to origin. A ref rejected by the remote is a `Push` error.
pub async fn push(dir: &Path, branch_name: &str, token: &str) -> Result<()> {
    validate_branch_name(branch_name)?;

    let dir = dir.to_path_buf();
    let branch_name = branch_name.to_string();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut remote = repo.find_remote("origin")?;
        let refspec = format!("refs/heads/{branch_name}:refs/heads/{branch_name}");

        let mut rejection: Option<String> = None;
        {
            let mut callbacks = credential_callbacks(&token);
            callbacks.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    rejection = Some(format!("{refname} rejected: {message}"));
                }
                Ok(())
            });
            let mut push_opts = PushOptions::new();
            push_opts.remote_callbacks(callbacks);
            remote
                .push(&[&refspec], Some(&mut push_opts))
                .map_err(|e| AppError::Push(e.message().to_string()))?;
        }

        match rejection {
            Some(reason) => Err(AppError::Push(reason)),
            None => Ok(()),
        }
    })
    .await
    .map_err(|e| AppError::Push(format!("Push task panicked: {e}")))?
}

/// Number of paths `git status` would report. Ignored files do not count.
pub async fn changed_path_count(dir: &Path) -> Result<usize> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = repo.statuses(Some(&mut opts))?;
        Ok(statuses.len())
    })
    .await
    .map_err(|e| AppError::Git(format!("Status task panicked: {e}")))?
}

/// Per-path changes between `base` and the working tree (index included,
/// untracked files reported as `NewFile`).
pub async fn changes_since(dir: &Path, base: &str) -> Result<Vec<FileChange>> {
    let dir = dir.to_path_buf();
    let base = base.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let base_tree = repo.find_commit(Oid::from_str(&base)?)?.tree()?;

        let mut opts = DiffOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let diff = repo.diff_tree_to_workdir_with_index(Some(&base_tree), Some(&mut opts))?;

        let changes = diff
            .deltas()
            .filter_map(|delta| {
                let status = classify_delta(delta.status())?;
                let path = delta
                    .new_file()
                    .path()
                    .or_else(|| delta.old_file().path())?
                    .to_string_lossy()
                    .into_owned();
                Some(FileChange { path, status })
            })
            .collect();
        Ok(changes)
    })
    .await
    .map_err(|e| AppError::Git(format!("Diff task panicked: {e}")))?
}

fn classify_delta(delta: Delta) -> Option<ChangeStatus> {
    match delta {
        Delta::Added | Delta::Copied => Some(ChangeStatus::Added),
        Delta::Deleted => Some(ChangeStatus::Deleted),
        // Untracked entries have no index state
        Delta::Untracked => Some(ChangeStatus::NewFile),
        Delta::Modified | Delta::Renamed | Delta::Typechange | Delta::Conflicted => {
            Some(ChangeStatus::Modified)
        }
        Delta::Unmodified | Delta::Ignored | Delta::Unreadable => None,
    }
}
