pub mod attachments;
pub mod process;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::ai::{AiProvider, AiResponse, TokenUsage};
use crate::config::CodegenConfig;
use crate::error::{AppError, Result};

pub use attachments::{enhance_prompt, AttachedFile};

/// Environment every generator process runs with: non-interactive, no colour codes.
const TOOL_ENV: [(&str, &str); 4] = [
    ("CI", "true"),
    ("NODE_ENV", "production"),
    ("FORCE_COLOR", "0"),
    ("NO_COLOR", "1"),
];

/// Runs an AI coding tool against a checked-out working tree.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(
        &self,
        provider: AiProvider,
        api_key: &str,
        prompt: &str,
        working_dir: &Path,
        model: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AiResponse>;
}

struct Tool<'a> {
    bin: &'a Path,
    args: &'a [String],
    key_env: &'static str,
}

/// Drives the `claude` CLI for Anthropic keys and the `codex` CLI for OpenAI keys.
pub struct CliCodeGenerator {
    claude_bin: PathBuf,
    claude_args: Vec<String>,
    codex_bin: PathBuf,
    codex_args: Vec<String>,
    timeout: Duration,
}

impl CliCodeGenerator {
    pub fn new(config: &CodegenConfig) -> Self {
        Self {
            claude_bin: config.claude_bin.clone(),
            claude_args: config.claude_args.clone(),
            codex_bin: config.codex_bin.clone(),
            codex_args: config.codex_args.clone(),
            timeout: config.timeout(),
        }
    }

    fn tool(&self, provider: AiProvider) -> Tool<'_> {
        match provider {
            AiProvider::Anthropic => Tool {
                bin: &self.claude_bin,
                args: &self.claude_args,
                key_env: "ANTHROPIC_API_KEY",
            },
            AiProvider::OpenAi => Tool {
                bin: &self.codex_bin,
                args: &self.codex_args,
                key_env: "OPENAI_API_KEY",
            },
        }
    }

    /// The key goes through the environment only, never argv.
    fn command(
        &self,
        provider: AiProvider,
        api_key: &str,
        working_dir: &Path,
        model: Option<&str>,
    ) -> Command {
        let tool = self.tool(provider);
        let mut cmd = Command::new(tool.bin);
        cmd.args(tool.args).current_dir(working_dir).env(tool.key_env, api_key);
        for (key, value) in TOOL_ENV {
            cmd.env(key, value);
        }
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            cmd.arg("--model").arg(model.trim());
        }
        cmd
    }
}

#[async_trait]
impl CodeGenerator for CliCodeGenerator {
    async fn generate(
        &self,
        provider: AiProvider,
        api_key: &str,
        prompt: &str,
        working_dir: &Path,
        model: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AiResponse> {
        let prompt = sanitize_prompt(prompt);
        let cmd = self.command(provider, api_key, working_dir, model);

        tracing::info!(
            provider = provider.display_name(),
            dir = %working_dir.display(),
            prompt_chars = prompt.chars().count(),
            "Running code generation"
        );

        let output = process::run_supervised(cmd, prompt.as_bytes(), self.timeout, cancel).await?;
        if !output.success() {
            return Err(AppError::Generation(failure_detail(&output)));
        }

        let usage = match provider {
            AiProvider::Anthropic => TokenUsage::new(
                estimate_tokens(&prompt),
                estimate_tokens(&output.stdout),
            ),
            // codex does not report usage on stdout
            AiProvider::OpenAi => TokenUsage::default(),
        };

        tracing::info!(
            provider = provider.display_name(),
            output_chars = output.stdout.len(),
            "Code generation finished"
        );

        Ok(AiResponse {
            content: output.stdout,
            usage,
        })
    }
}

/// Drop replacement characters left over from a lossy decode upstream.
pub fn sanitize_prompt(prompt: &str) -> String {
    prompt.replace(char::REPLACEMENT_CHARACTER, "")
}

/// Rough token count: a quarter of the character count, rounded up.
fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

fn failure_detail(output: &process::ProcessOutput) -> String {
    let code = output
        .status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    let stderr = output.stderr.trim();
    let detail = if stderr.is_empty() {
        output.stdout.trim()
    } else {
        stderr
    };
    if detail.is_empty() {
        format!("process exited with code {code}")
    } else {
        format!("process exited with code {code}: {detail}")
    }
}
