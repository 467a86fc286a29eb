pub fn branch_naming_prompt(user_prompt: &str) -> String {
    format!(
        r#"You name git branches for code changes.

Generate a branch name for the following change request:

{user_prompt}

## Rules
- Start with one of these prefixes: feat/, fix/, chore/, docs/, style/, refactor/, test/, perf/
- Use lowercase letters, digits and hyphens after the prefix
- Keep the whole name under 50 characters
- Describe the change, not the request (e.g. feat/add-health-check)

Respond with the branch name only. No quotes, no explanation."#
    )
}

pub fn pr_description_prompt(user_prompt: &str, total_files: usize, changes_text: &str) -> String {
    format!(
        r#"You are writing the description of a GitHub pull request produced by an AI coding agent.

## Original request
{user_prompt}

## Changed files ({total_files})
{changes_section}

## Instructions
Write a concise pull request description in Markdown with these sections:
- **Summary**: one or two sentences on what the change does.
- **Changes**: a bullet list grouped by area, based on the changed files.
- **Notes for reviewers**: anything that deserves a closer look.

Do not invent changes that are not in the file list. Respond with the description only."#,
        changes_section = if changes_text.is_empty() {
            "(no file changes were detected)".to_string()
        } else {
            changes_text.to_string()
        }
    )
}
