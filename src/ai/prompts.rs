//! Prompt texts and tolerant parsing of provider replies.
//!
//! Replies are parsed in two steps: the outermost `{...}` substring is cut
//! out of the raw text, then validated against the expected shape. A missing
//! object and a shape mismatch are both "unparseable".

use serde::Deserialize;

use crate::error::{AppError, Result};

pub const MAX_POST_CHARS: usize = 280;

pub const ANALYSIS_SYSTEM_PROMPT: &str = "\
You are a content editor. Evaluate if the following news article is suitable for posting on X (Twitter).
Consider: relevance, timeliness, engagement potential, and appropriateness.

Respond ONLY with valid JSON: { \"eligible\": true, \"reason\": \"brief explanation\" }
or { \"eligible\": false, \"reason\": \"brief explanation\" }";

pub const AUTHORING_SYSTEM_PROMPT: &str = "\
You are a social media expert specializing in news content.
Given a news article title and summary, generate a compelling post for X (Twitter).

Rules:
- The post must be <= 280 characters (including hashtags)
- Write in the same language as the article
- Be engaging and informative
- Do not use emojis unless the brand voice calls for it

Respond ONLY with valid JSON: { \"text\": \"...\", \"hashtags\": [\"...\", \"...\"] }";

pub fn user_prompt(title: &str, summary: &str) -> String {
    format!("Title:\n{}\n\nSummary:\n{}", title.trim(), summary.trim())
}

/// Authoring input with the complete body; falls back to the summary when
/// the body is blank.
pub fn full_content_user_prompt(title: &str, full_content: &str, summary: Option<&str>) -> String {
    let body = Some(full_content.trim())
        .filter(|b| !b.is_empty())
        .or_else(|| summary.map(str::trim))
        .unwrap_or_default();
    format!("Title:\n{}\n\nFull article:\n{}", title.trim(), body)
}

/// Substring from the first `{` to the last `}`.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisVerdict {
    pub eligible: bool,
    pub reason: String,
}

impl AnalysisVerdict {
    fn assume_eligible(reason: &str) -> Self {
        Self {
            eligible: true,
            reason: reason.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct RawVerdict {
    eligible: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Parse an eligibility reply. Anything unparseable counts as eligible.
pub fn parse_analysis_response(raw: &str) -> AnalysisVerdict {
    let Some(json) = extract_json_object(raw) else {
        return AnalysisVerdict::assume_eligible("Failed to parse analysis response");
    };

    let value: serde_json::Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(_) => return AnalysisVerdict::assume_eligible("Analysis response is not valid JSON"),
    };

    match serde_json::from_value::<RawVerdict>(value) {
        Ok(verdict) => AnalysisVerdict {
            eligible: verdict.eligible,
            reason: verdict.reason.unwrap_or_default(),
        },
        Err(_) => AnalysisVerdict::assume_eligible("Invalid analysis response format"),
    }
}

/// Post text and hashtags, already clamped and normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoredPost {
    pub text: String,
    pub hashtags: Vec<String>,
}

#[derive(Deserialize)]
struct RawPost {
    text: String,
    hashtags: Vec<String>,
}

pub fn parse_authoring_response(raw: &str) -> Result<AuthoredPost> {
    let json = extract_json_object(raw)
        .ok_or_else(|| AppError::ResponseParse("No JSON object found in AI response".to_string()))?;

    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|_| AppError::ResponseParse("AI response is not valid JSON".to_string()))?;

    let post: RawPost = serde_json::from_value(value)
        .ok()
        .filter(|p: &RawPost| !p.text.trim().is_empty())
        .ok_or_else(|| {
            AppError::ResponseParse("AI response JSON does not match expected schema".to_string())
        })?;

    Ok(AuthoredPost {
        text: clamp_text(&post.text),
        hashtags: normalize_hashtags(&post.hashtags),
    })
}

pub fn clamp_text(text: &str) -> String {
    text.trim().chars().take(MAX_POST_CHARS).collect()
}

/// Trim, drop empties, prefix `#`, dedupe keeping first occurrence.
pub fn normalize_hashtags(hashtags: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    hashtags
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(|tag| {
            if tag.starts_with('#') {
                tag.to_string()
            } else {
                format!("#{tag}")
            }
        })
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}
