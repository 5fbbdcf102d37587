use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a source is scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Feed,
    Html,
    /// Feed first, HTML selectors when the feed yields nothing.
    Auto,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Feed => "feed",
            Strategy::Html => "html",
            Strategy::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "feed" | "rss" => Some(Strategy::Feed),
            "html" => Some(Strategy::Html),
            "auto" => Some(Strategy::Auto),
            _ => None,
        }
    }
}

/// CSS selectors used by the HTML strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSet {
    pub article: String,
    pub title: String,
    pub summary: String,
    pub link: String,
}

#[derive(Debug, Clone)]
pub struct Source {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub url: String,
    pub strategy: Strategy,
    pub feed_url: Option<String>,
    pub selectors: Option<SelectorSet>,
    pub scrape_interval_hours: u32,
    pub is_active: bool,
    pub auto_publish: bool,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSource {
    pub account_id: i64,
    pub name: String,
    pub url: String,
    pub strategy: Strategy,
    pub feed_url: Option<String>,
    pub selectors: Option<SelectorSet>,
    pub scrape_interval_hours: u32,
    pub auto_publish: bool,
}

impl NewSource {
    pub fn new(account_id: i64, name: impl Into<String>, url: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            account_id,
            name: name.into(),
            url: url.into(),
            strategy,
            feed_url: None,
            selectors: None,
            scrape_interval_hours: 4,
            auto_publish: false,
        }
    }
}
