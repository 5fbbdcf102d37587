mod anthropic;
mod openai;
pub mod prompts;
pub mod rules;
mod summarizer;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{Config, ProviderKind};
use crate::error::{AppError, Result};

pub use anthropic::AnthropicProvider;
pub use openai::ChatCompletionsProvider;
pub use prompts::{AnalysisVerdict, AuthoredPost, MAX_POST_CHARS};
pub use summarizer::summarize;

/// Upper bound on one provider request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client")
}

/// A generative-text backend: system and user instruction in, free text out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate_raw(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Ask for eligibility. Provider errors propagate; an unreadable reply
/// counts as eligible.
pub async fn analyze(
    provider: &dyn TextProvider,
    system_prompt: &str,
    title: &str,
    summary: &str,
) -> Result<AnalysisVerdict> {
    let raw = provider
        .generate_raw(system_prompt, &prompts::user_prompt(title, summary))
        .await?;
    Ok(prompts::parse_analysis_response(&raw))
}

/// Author post text and hashtags. An unreadable reply is an error.
pub async fn draft_post(provider: &dyn TextProvider, system_prompt: &str, user_prompt: &str) -> Result<AuthoredPost> {
    let raw = provider.generate_raw(system_prompt, user_prompt).await?;
    prompts::parse_authoring_response(&raw)
}

/// Build the provider selected in config.
pub fn build_provider(config: &Config) -> Result<Arc<dyn TextProvider>> {
    let api_key = config
        .provider_api_key()
        .ok_or_else(|| {
            AppError::Config(format!(
                "no API key configured for provider '{}'",
                config.ai_provider.as_str()
            ))
        })?
        .to_string();
    let model = config.ai_model.clone();

    let provider: Arc<dyn TextProvider> = match config.ai_provider {
        ProviderKind::OpenAi => Arc::new(ChatCompletionsProvider::openai(api_key, model)),
        ProviderKind::DeepSeek => Arc::new(ChatCompletionsProvider::deepseek(api_key, model)),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(api_key, model)),
    };

    tracing::debug!(provider = provider.name(), "Text provider ready");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn analyze_fails_open_on_garbage() {
        let mut provider = MockTextProvider::new();
        provider
            .expect_generate_raw()
            .withf(|_, user| user.starts_with("Title:\nHeadline"))
            .returning(|_, _| Ok("Absolutely, post it!".to_string()));

        let verdict = analyze(&provider, "SYS", "Headline", "Summary").await.unwrap();
        assert!(verdict.eligible);
    }

    #[tokio::test]
    async fn draft_post_surfaces_parse_errors() {
        let mut provider = MockTextProvider::new();
        provider
            .expect_generate_raw()
            .returning(|_, _| Ok("sorry, cannot help".to_string()));

        let err = draft_post(&provider, "SYS", "USER").await.unwrap_err();
        assert!(matches!(err, AppError::ResponseParse(_)));
    }

    #[test]
    fn provider_is_selected_by_config() {
        let config = Config {
            ai_provider: ProviderKind::Anthropic,
            anthropic_api_key: Some("sk-ant".to_string()),
            ..Config::default()
        };
        assert_eq!(build_provider(&config).unwrap().name(), "anthropic");

        let config = Config {
            ai_provider: ProviderKind::DeepSeek,
            ..Config::default()
        };
        assert!(matches!(build_provider(&config), Err(AppError::Config(_))));
    }
}
