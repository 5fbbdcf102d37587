use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{http_client, TextProvider, REQUEST_TIMEOUT};
use crate::error::{AppError, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client. Serves both OpenAI and DeepSeek, which speaks
/// the same protocol.
pub struct ChatCompletionsProvider {
    client: Client,
    name: &'static str,
    api_key: String,
    model: String,
    base_url: String,
}

impl ChatCompletionsProvider {
    pub fn openai(api_key: String, model: Option<String>) -> Self {
        Self::build("openai", api_key, model.unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()), OPENAI_BASE_URL)
    }

    pub fn deepseek(api_key: String, model: Option<String>) -> Self {
        Self::build(
            "deepseek",
            api_key,
            model.unwrap_or_else(|| DEEPSEEK_DEFAULT_MODEL.to_string()),
            DEEPSEEK_BASE_URL,
        )
    }

    fn build(name: &'static str, api_key: String, model: String, base_url: &str) -> Self {
        Self {
            client: http_client(REQUEST_TIMEOUT),
            name,
            api_key,
            model,
            base_url: base_url.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    #[cfg(test)]
    fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextProvider for ChatCompletionsProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn generate_raw(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.4,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Provider {
                provider: self.name,
                status: Some(status.as_u16()),
                message: error_text,
            });
        }

        let chat: ChatResponse = response.json().await?;
        Ok(chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}
