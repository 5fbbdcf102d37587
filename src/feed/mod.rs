mod discovery;
mod fetcher;
mod html;
pub mod text;

use async_trait::async_trait;

use crate::models::{ScrapedArticle, Source};

pub use discovery::FeedDiscovery;
pub use fetcher::{parse_feed, FeedScraper, DEFAULT_MAX_ITEMS};
pub use html::{parse_html, HtmlScraper};

/// Sent by every outbound fetch; some sites refuse non-browser agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const SUMMARY_MAX_CHARS: usize = 500;

/// A scraping strategy. Implementations never fail: errors are logged and
/// produce an empty list.
#[async_trait]
pub trait Scrape: Send + Sync {
    async fn scrape(&self, source: &Source) -> Vec<ScrapedArticle>;

    /// Same as `scrape` with an explicit item cap.
    async fn preview(&self, source: &Source, max_items: usize) -> Vec<ScrapedArticle>;
}
