use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub codegen: CodegenConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct GitHubConfig {
    /// Override for GitHub Enterprise, e.g. `https://ghe.example.com/api/v3`.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Token used when a request does not carry one.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_github_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            token: None,
            request_timeout_secs: default_github_timeout(),
        }
    }
}

// Manual Debug impl to avoid leaking the token
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_base_url", &self.api_base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl GitHubConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Deserialize, Clone)]
pub struct AiConfig {
    /// Provider key used when a request does not carry one.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_ai_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            anthropic_model: default_anthropic_model(),
            openai_model: default_openai_model(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_ai_timeout(),
        }
    }
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("anthropic_model", &self.anthropic_model)
            .field("openai_model", &self.openai_model)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl AiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CodegenConfig {
    #[serde(default = "default_claude_bin")]
    pub claude_bin: PathBuf,
    #[serde(default = "default_claude_args")]
    pub claude_args: Vec<String>,
    #[serde(default = "default_codex_bin")]
    pub codex_bin: PathBuf,
    #[serde(default = "default_codex_args")]
    pub codex_args: Vec<String>,
    #[serde(default = "default_codegen_timeout")]
    pub timeout_secs: u64,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            claude_bin: default_claude_bin(),
            claude_args: default_claude_args(),
            codex_bin: default_codex_bin(),
            codex_args: default_codex_args(),
            timeout_secs: default_codegen_timeout(),
        }
    }
}

impl CodegenConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_dir")]
    pub base_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_dir: default_workspace_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_github_timeout() -> u64 {
    30
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_openai_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_ai_timeout() -> u64 {
    60
}

fn default_claude_bin() -> PathBuf {
    PathBuf::from("claude")
}

fn default_claude_args() -> Vec<String> {
    vec!["-p".to_string(), "--dangerously-skip-permissions".to_string()]
}

fn default_codex_bin() -> PathBuf {
    PathBuf::from("codex")
}

fn default_codex_args() -> Vec<String> {
    vec!["exec".to_string(), "--full-auto".to_string(), "-".to_string()]
}

fn default_codegen_timeout() -> u64 {
    1000
}

fn default_workspace_dir() -> PathBuf {
    std::env::temp_dir().join("autopr-workspaces")
}

fn default_max_files() -> usize {
    2
}

fn default_max_file_bytes() -> usize {
    10 * 1024 * 1024 // 10 MB
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("autopr").required(false));
        }

        // Environment variable overrides, e.g. AUTOPR__GITHUB__TOKEN
        builder = builder.add_source(
            config::Environment::with_prefix("AUTOPR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn credential_defaults(&self) -> CredentialDefaults {
        CredentialDefaults {
            ai_key: self.ai.api_key.clone(),
            github_token: self.github.token.clone(),
        }
    }
}

/// Process-wide fallbacks for credentials missing from a request.
///
/// Resolution happens at the request boundary; the workflow only ever sees
/// the resolved values.
#[derive(Clone, Default)]
pub struct CredentialDefaults {
    ai_key: Option<String>,
    github_token: Option<String>,
}

impl CredentialDefaults {
    pub fn new(ai_key: Option<String>, github_token: Option<String>) -> Self {
        Self {
            ai_key,
            github_token,
        }
    }

    pub fn resolve_ai_key(&self, supplied: Option<&str>) -> String {
        resolve(supplied, self.ai_key.as_deref())
    }

    pub fn resolve_github_token(&self, supplied: Option<&str>) -> String {
        resolve(supplied, self.github_token.as_deref())
    }
}

fn resolve(supplied: Option<&str>, fallback: Option<&str>) -> String {
    supplied
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| fallback.map(str::trim))
        .unwrap_or_default()
        .to_string()
}
