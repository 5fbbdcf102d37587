use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "published" => PostStatus::Published,
            _ => PostStatus::Failed,
        }
    }
}

/// One publication attempt. Never updated after insert.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub account_id: i64,
    pub draft_id: Option<i64>,
    pub content: String,
    pub status: PostStatus,
    pub platform_post_id: Option<String>,
    pub platform_post_url: Option<String>,
    pub error_message: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub account_id: i64,
    pub draft_id: Option<i64>,
    pub content: String,
    pub status: PostStatus,
    pub platform_post_id: Option<String>,
    pub platform_post_url: Option<String>,
    pub error_message: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl NewPost {
    pub fn published(account_id: i64, draft_id: Option<i64>, content: String, id: String, url: String) -> Self {
        Self {
            account_id,
            draft_id,
            content,
            status: PostStatus::Published,
            platform_post_id: Some(id),
            platform_post_url: Some(url),
            error_message: None,
            published_at: Some(Utc::now()),
        }
    }

    pub fn failed(account_id: i64, draft_id: Option<i64>, content: String, error: String) -> Self {
        Self {
            account_id,
            draft_id,
            content,
            status: PostStatus::Failed,
            platform_post_id: None,
            platform_post_url: None,
            error_message: Some(error),
            published_at: None,
        }
    }
}
