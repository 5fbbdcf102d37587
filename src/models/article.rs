use chrono::{DateTime, Utc};
use serde::Serialize;

/// A normalized item produced by either scraping strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapedArticle {
    pub url: String,
    pub title: String,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Article {
    pub id: i64,
    pub source_id: i64,
    pub url: String,
    pub title: String,
    pub summary: Option<String>,
    /// Full body, fetched lazily and cached once.
    pub full_content: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// Text to author from when the full body cannot be fetched.
    pub fn fallback_content(&self) -> String {
        self.summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.title)
            .to_string()
    }
}
