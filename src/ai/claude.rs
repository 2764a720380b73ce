use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};

use super::LlmSettings;
use crate::prompt::PromptMessages;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    system: String,
    temperature: f32,
    messages: Vec<ClaudeMessage>,
}

#[derive(Deserialize)]
struct ClaudeContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
}

impl ClaudeClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn query(&self, settings: &LlmSettings, messages: &PromptMessages) -> Result<String> {
        let request = ClaudeRequest {
            model: settings.model.clone(),
            max_tokens: 4096,
            system: messages.system.clone(),
            // Anthropic caps temperature at 1.0
            temperature: settings.temperature.min(1.0),
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: messages.user.clone(),
            }],
        };

        let response = self.client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Claude API error {}: {}", status, text));
        }

        let claude_response: ClaudeResponse = response.json().await?;
        let text: String = claude_response.content.into_iter().map(|c| c.text).collect();
        if text.trim().is_empty() {
            return Err(anyhow!("Claude returned no text"));
        }
        Ok(text)
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "claude-3-5-haiku-latest".to_string(),
            "claude-3-5-sonnet-latest".to_string(),
            "claude-sonnet-4-20250514".to_string(),
        ]
    }
}
