pub mod claude;
pub mod openai;
pub mod prompt;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::AiConfig;
use crate::error::Result;
use claude::ClaudeClient;
use openai::OpenAiClient;

const ANTHROPIC_KEY_PREFIX: &str = "sk-ant-";
const OPENAI_KEY_PREFIX: &str = "sk-";

/// AI vendor behind a key. Determined once from the key's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AiProvider {
    Anthropic,
    OpenAi,
}

impl AiProvider {
    /// Classify a key by prefix. `sk-ant-` is tested first since it also
    /// starts with the OpenAI prefix.
    pub fn classify(key: &str) -> Option<Self> {
        let key = key.trim();
        if key.starts_with(ANTHROPIC_KEY_PREFIX) {
            Some(AiProvider::Anthropic)
        } else if key.starts_with(OPENAI_KEY_PREFIX) {
            Some(AiProvider::OpenAi)
        } else {
            None
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AiProvider::Anthropic => "Anthropic",
            AiProvider::OpenAi => "OpenAI",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// Text produced by one AI call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiResponse {
    pub content: String,
    pub usage: TokenUsage,
}

/// A single-turn completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Text completion against one of the supported providers.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        provider: AiProvider,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<AiResponse>;
}

/// Completions over the providers' HTTP APIs. A client is constructed for
/// every call from the key it is given.
pub struct HttpLanguageModel {
    config: AiConfig,
}

impl HttpLanguageModel {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn complete(
        &self,
        provider: AiProvider,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<AiResponse> {
        let timeout = self.config.request_timeout();
        let response = match provider {
            AiProvider::Anthropic => {
                let model = request
                    .model
                    .as_deref()
                    .unwrap_or(&self.config.anthropic_model);
                ClaudeClient::new(api_key, model, request.max_tokens, timeout)?
                    .complete(&request.prompt, request.temperature)
                    .await?
            }
            AiProvider::OpenAi => {
                let model = request.model.as_deref().unwrap_or(&self.config.openai_model);
                OpenAiClient::new(api_key, model, request.max_tokens, timeout)?
                    .complete(&request.prompt, request.temperature)
                    .await?
            }
        };

        tracing::debug!(
            provider = provider.display_name(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion received"
        );

        Ok(response)
    }
}
