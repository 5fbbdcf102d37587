use std::time::Duration;

use async_trait::async_trait;
use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::header::ACCEPT;
use reqwest::Client;

use super::text::{clean_xml, strip_html, truncate_words};
use super::{Scrape, BROWSER_USER_AGENT, SUMMARY_MAX_CHARS};
use crate::error::{AppError, Result};
use crate::models::{ScrapedArticle, Source};

pub const DEFAULT_MAX_ITEMS: usize = 20;

/// Syndication-feed strategy (RSS and Atom).
pub struct FeedScraper {
    client: Client,
    max_items: usize,
}

impl FeedScraper {
    pub fn new(max_items: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, max_items }
    }

    /// Fetch and map a feed. Failures are logged and yield an empty list.
    pub async fn scrape_url(&self, feed_url: &str, max_items: usize) -> Vec<ScrapedArticle> {
        match self.fetch_feed(feed_url, max_items).await {
            Ok(articles) => {
                tracing::debug!(feed_url, count = articles.len(), "Fetched feed");
                articles
            }
            Err(e) => {
                tracing::warn!(feed_url, error = %e, "Failed to scrape feed");
                Vec::new()
            }
        }
    }

    async fn fetch_feed(&self, feed_url: &str, max_items: usize) -> Result<Vec<ScrapedArticle>> {
        let response = self
            .client
            .get(feed_url)
            .header(
                ACCEPT,
                "application/rss+xml, application/atom+xml, application/xml, text/xml",
            )
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch feed: HTTP {}", response.status()).into());
        }

        let body = response.text().await?;
        parse_feed(&body, max_items)
    }
}

impl Default for FeedScraper {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITEMS)
    }
}

#[async_trait]
impl Scrape for FeedScraper {
    async fn scrape(&self, source: &Source) -> Vec<ScrapedArticle> {
        self.preview(source, self.max_items).await
    }

    async fn preview(&self, source: &Source, max_items: usize) -> Vec<ScrapedArticle> {
        match &source.feed_url {
            Some(feed_url) => self.scrape_url(feed_url, max_items).await,
            None => {
                tracing::debug!(source_id = source.id, "Source has no feed URL");
                Vec::new()
            }
        }
    }
}

/// Parse raw feed text into at most `max_items` articles.
pub fn parse_feed(raw: &str, max_items: usize) -> Result<Vec<ScrapedArticle>> {
    let feed = parser::parse(clean_xml(raw).as_bytes()).map_err(AppError::from)?;

    Ok(feed
        .entries
        .into_iter()
        .take(max_items)
        .filter_map(entry_to_article)
        .collect())
}

fn entry_to_article(entry: Entry) -> Option<ScrapedArticle> {
    let url = entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())?;

    let title = entry
        .title
        .as_ref()
        .map(|t| strip_html(&t.content))
        .filter(|t| !t.is_empty())?;

    // Rich content first, then the description snippet, then media text
    let summary = entry
        .content
        .as_ref()
        .and_then(|c| c.body.as_deref())
        .map(strip_html)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            entry
                .summary
                .as_ref()
                .map(|s| strip_html(&s.content))
                .filter(|s| !s.is_empty())
        })
        .or_else(|| {
            entry
                .media
                .iter()
                .find_map(|m| m.description.as_ref())
                .map(|d| strip_html(&d.content))
                .filter(|s| !s.is_empty())
        })
        .map(|s| truncate_words(&s, SUMMARY_MAX_CHARS));

    Some(ScrapedArticle {
        url,
        title,
        summary,
        published_at: entry.published.or(entry.updated),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Strategy;
    use chrono::{Datelike, Utc};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Example News</title>
    <link>https://example.com</link>
    <description>News</description>
    <item>
      <title>First story</title>
      <link>https://example.com/first</link>
      <description>Plain &lt;b&gt;snippet&lt;/b&gt;</description>
      <content:encoded><![CDATA[<p>Rich <strong>body</strong> &amp; more</p>]]></content:encoded>
      <pubDate>Tue, 10 Jun 2025 04:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Second story</title>
      <link>https://example.com/second</link>
      <description>Only a snippet</description>
      <pubDate>not a date</pubDate>
    </item>
    <item>
      <title>No link here</title>
      <description>Skipped</description>
    </item>
    <item>
      <link>https://example.com/untitled</link>
      <description>Skipped too</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn maps_items_and_skips_incomplete_ones() {
        let articles = parse_feed(RSS, 20).unwrap();

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].url, "https://example.com/first");
        assert_eq!(articles[0].summary.as_deref(), Some("Rich body & more"));
        assert_eq!(articles[0].published_at.map(|d| d.year()), Some(2025));

        assert_eq!(articles[1].summary.as_deref(), Some("Only a snippet"));
        assert!(articles[1].published_at.is_none());
    }

    #[test]
    fn respects_item_limit() {
        let articles = parse_feed(RSS, 1).unwrap();
        assert_eq!(articles.len(), 1);
    }

    #[test]
    fn long_summaries_are_truncated() {
        let body = "word ".repeat(200);
        let rss = format!(
            r#"<rss version="2.0"><channel><title>t</title><item><title>Long</title><link>https://e.com/l</link><description>{body}</description></item></channel></rss>"#
        );
        let articles = parse_feed(&rss, 20).unwrap();
        let summary = articles[0].summary.as_deref().unwrap();
        assert!(summary.ends_with("..."));
        assert!(summary.chars().count() <= SUMMARY_MAX_CHARS + 3);
    }

    #[test]
    fn parses_atom_with_leading_noise() {
        let atom = r#"

  <?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom</title>
  <id>urn:example</id>
  <updated>2025-01-01T00:00:00Z</updated>
  <entry>
    <title>Atom entry</title>
    <id>urn:entry:1</id>
    <link rel="alternate" href="https://example.com/atom-1"/>
    <updated>2025-01-02T00:00:00Z</updated>
    <summary>Atom summary</summary>
  </entry>
</feed>"#;
        let articles = parse_feed(atom, 20).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://example.com/atom-1");
        assert_eq!(articles[0].summary.as_deref(), Some("Atom summary"));
        assert!(articles[0].published_at.is_some());
    }

    #[tokio::test]
    async fn fetch_failures_yield_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/garbage.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let scraper = FeedScraper::default();
        assert!(scraper.scrape_url(&format!("{}/broken.xml", server.uri()), 20).await.is_empty());
        assert!(scraper.scrape_url(&format!("{}/garbage.xml", server.uri()), 20).await.is_empty());
    }

    #[tokio::test]
    async fn scrapes_source_feed_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;

        let source = Source {
            id: 1,
            account_id: 1,
            name: "Example".to_string(),
            url: server.uri(),
            strategy: Strategy::Feed,
            feed_url: Some(format!("{}/feed.xml", server.uri())),
            selectors: None,
            scrape_interval_hours: 4,
            is_active: true,
            auto_publish: false,
            last_scraped_at: None,
            created_at: Utc::now(),
        };

        let articles = FeedScraper::default().scrape(&source).await;
        assert_eq!(articles.len(), 2);
    }
}
