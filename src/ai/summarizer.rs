use serde::Deserialize;

use super::prompts::extract_json_object;
use super::TextProvider;
use crate::error::{AppError, Result};
use crate::models::ArticleSummary;

const SUMMARIZE_PROMPT: &str = r#"You are a professional editor. Given an article, create a concise summary with 3-5 bullet points in the same language as the article.

Rules:
- Each bullet point should be a complete sentence
- Focus on key facts and takeaways
- Keep each bullet under 150 characters
- Write in the same language as the article
- Do NOT include the bullet symbol (•, -, *) - just the text

Respond ONLY with valid JSON: { "bullets": ["point 1", "point 2", ...] }"#;

const MAX_CONTENT_CHARS: usize = 3000;
const MAX_BULLETS: usize = 5;
const MAX_BULLET_CHARS: usize = 150;

#[derive(Deserialize)]
struct RawSummary {
    bullets: Vec<String>,
}

/// Bullet digest of an article. Never fails: any problem degrades to a
/// single bullet holding the title.
pub async fn summarize(provider: &dyn TextProvider, title: &str, content: &str) -> ArticleSummary {
    match try_summarize(provider, title, content).await {
        Ok(summary) if !summary.bullets.is_empty() => summary,
        Ok(_) => ArticleSummary::single(title),
        Err(e) => {
            tracing::warn!(error = %e, "Summary generation failed, using title");
            ArticleSummary::single(title)
        }
    }
}

async fn try_summarize(provider: &dyn TextProvider, title: &str, content: &str) -> Result<ArticleSummary> {
    // Keep the prompt well inside provider token limits
    let content = if content.chars().count() > MAX_CONTENT_CHARS {
        format!("{}...", content.chars().take(MAX_CONTENT_CHARS).collect::<String>())
    } else {
        content.to_string()
    };

    let user_message = format!("Article Title: {title}\n\nArticle Content:\n{content}");
    let raw = provider.generate_raw(SUMMARIZE_PROMPT, &user_message).await?;
    parse_summary(&raw)
}

fn parse_summary(raw: &str) -> Result<ArticleSummary> {
    let json = extract_json_object(raw)
        .ok_or_else(|| AppError::ResponseParse("No JSON object found in summary response".to_string()))?;
    let parsed: RawSummary = serde_json::from_str(json)
        .map_err(|e| AppError::ResponseParse(format!("Invalid summary format: {e}")))?;

    let bullets = parsed
        .bullets
        .iter()
        .map(|b| b.trim())
        .filter(|b| !b.is_empty())
        .take(MAX_BULLETS)
        .map(|b| b.chars().take(MAX_BULLET_CHARS).collect())
        .collect();

    Ok(ArticleSummary { bullets })
}
