pub mod claude;
pub mod ollama;
pub mod openai;

pub use claude::ClaudeClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Config, Settings};
use crate::error::SetupError;
use crate::prompt::PromptMessages;
use crate::provider::Provider;

/// Model name and sampling temperature for every request in a session.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f32,
}

/// A hosted or local chat model that turns one system + user message pair into text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, settings: &LlmSettings, messages: &PromptMessages) -> Result<String>;
}

#[async_trait]
impl ChatModel for OpenAIClient {
    async fn complete(&self, settings: &LlmSettings, messages: &PromptMessages) -> Result<String> {
        self.query(settings, messages).await
    }
}

#[async_trait]
impl ChatModel for ClaudeClient {
    async fn complete(&self, settings: &LlmSettings, messages: &PromptMessages) -> Result<String> {
        self.query(settings, messages).await
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn complete(&self, settings: &LlmSettings, messages: &PromptMessages) -> Result<String> {
        self.query(settings, messages).await
    }
}

/// Build the client for the configured provider.
pub fn build_client(settings: &Settings) -> Result<Arc<dyn ChatModel>, SetupError> {
    let missing_key = |provider: Provider| SetupError::MissingApiKey {
        provider,
        var: provider.api_key_var().unwrap_or_default(),
        config: Config::get_config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "the config file".to_string()),
    };

    let client: Arc<dyn ChatModel> = match settings.provider {
        Provider::OpenAI => {
            let key = settings.api_key.as_deref().ok_or_else(|| missing_key(Provider::OpenAI))?;
            Arc::new(OpenAIClient::new(key))
        }
        Provider::Claude => {
            let key = settings.api_key.as_deref().ok_or_else(|| missing_key(Provider::Claude))?;
            Arc::new(ClaudeClient::new(key))
        }
        Provider::Ollama => Arc::new(OllamaClient::new(&settings.ollama_url)),
    };
    Ok(client)
}

/// Models offered for a provider. Ollama is asked over HTTP.
pub async fn list_models(settings: &Settings) -> Result<Vec<String>> {
    match settings.provider {
        Provider::OpenAI => Ok(OpenAIClient::list_models()),
        Provider::Claude => Ok(ClaudeClient::list_models()),
        Provider::Ollama => OllamaClient::new(&settings.ollama_url).list_models().await,
    }
}
