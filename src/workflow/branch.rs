use std::sync::Arc;

use crate::ai::prompt::branch_naming_prompt;
use crate::ai::{AiProvider, CompletionRequest, LanguageModel};

/// Prefixes a branch name may start with. Anything else gets `feat/`.
pub const BRANCH_PREFIXES: [&str; 8] = [
    "feat/",
    "fix/",
    "chore/",
    "docs/",
    "style/",
    "refactor/",
    "test/",
    "perf/",
];

const DEFAULT_PREFIX: &str = "feat/";
const MAX_BRANCH_LEN: usize = 50;
const MAX_NAME_TOKENS: u32 = 50;
const NAMING_TEMPERATURE: f32 = 0.1;
/// Words of the prompt used when the name is derived locally.
const FALLBACK_WORDS: usize = 6;

/// Derives a branch name from a change request, with the model's help.
pub struct BranchNamer {
    model: Arc<dyn LanguageModel>,
}

impl BranchNamer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn derive_name(
        &self,
        provider: AiProvider,
        api_key: &str,
        prompt: &str,
        model_override: Option<&str>,
    ) -> String {
        let request = CompletionRequest {
            prompt: branch_naming_prompt(prompt),
            model: model_override.map(str::to_string),
            max_tokens: MAX_NAME_TOKENS,
            temperature: NAMING_TEMPERATURE,
        };

        match self.model.complete(provider, api_key, &request).await {
            Ok(response) => match normalize(&response.content) {
                Some(name) => {
                    tracing::info!(branch = %name, "Branch name generated");
                    return name;
                }
                None => tracing::warn!(
                    raw = %response.content,
                    "Model returned an unusable branch name, deriving from prompt"
                ),
            },
            Err(e) => tracing::warn!(
                error = %e,
                "Branch naming request failed, deriving from prompt"
            ),
        }

        derive_from_prompt(prompt)
    }
}

/// Turn free text into a branch name.
///
/// The result contains only `[a-z0-9-/]`, starts with one of
/// [`BRANCH_PREFIXES`], is at most 50 characters and is a fixed point of
/// this function. `None` when nothing usable remains.
pub fn normalize(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_lowercase();

    let mut name = String::with_capacity(line.len());
    for c in line.chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '/' {
            c
        } else {
            '-'
        };
        if c == '/' && name.ends_with('/') {
            continue;
        }
        name.push(c);
    }
    let name = name.trim_start_matches(['/', '-']);

    let (prefix, rest) = match BRANCH_PREFIXES.iter().find(|p| name.starts_with(*p)) {
        Some(prefix) => (*prefix, &name[prefix.len()..]),
        None => (DEFAULT_PREFIX, name),
    };

    let mut candidate = format!("{prefix}{rest}");
    candidate.truncate(MAX_BRANCH_LEN);
    let candidate = candidate.trim_end_matches(['-', '/']);

    // Nothing left after the prefix
    if candidate.len() <= prefix.len() {
        return None;
    }
    Some(candidate.to_string())
}

/// Branch name built from the first words of the prompt, used when the model
/// gives nothing usable.
pub fn derive_from_prompt(prompt: &str) -> String {
    let words = prompt
        .split_whitespace()
        .take(FALLBACK_WORDS)
        .collect::<Vec<_>>()
        .join("-");
    normalize(&words).unwrap_or_else(|| format!("{DEFAULT_PREFIX}ai-update"))
}
