// src/job_analysis/oracle.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4";
const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 2000;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Language-model completion service used to score a resume against a job.
#[async_trait]
pub trait AnalysisOracle: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

#[async_trait]
impl<T: AnalysisOracle + ?Sized> AnalysisOracle for Arc<T> {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        (**self).complete(system_prompt, user_prompt).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI chat-completions client.
pub struct OpenAiOracle {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiOracle {
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AnalysisOracle for OpenAiOracle {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!("Sending completion request to {} ({})", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to completion API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Completion API error {}: {}", status, error_text);
            anyhow::bail!("Completion API returned error {}: {}", status, error_text);
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse completion API response")?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .context("Completion API returned no content")?;

        Ok(content)
    }
}
