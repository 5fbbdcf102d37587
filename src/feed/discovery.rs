use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use super::{parse_feed, BROWSER_USER_AGENT};

/// Conventional feed locations tried against the site origin.
const CONVENTIONAL_PATHS: [&str; 6] = ["/feed", "/rss", "/feed.xml", "/rss.xml", "/atom.xml", "/index.xml"];

const FEED_MIME_TYPES: [&str; 2] = ["application/rss+xml", "application/atom+xml"];

/// Locates a syndication feed for a site. Never fails: every network or
/// parse problem is treated as "not found".
pub struct FeedDiscovery {
    client: Client,
}

impl FeedDiscovery {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    pub async fn discover(&self, site_url: &str) -> Option<String> {
        let base = match Url::parse(site_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(site_url, error = %e, "Not a valid site URL");
                return None;
            }
        };

        if let Some(body) = self.fetch_text(base.as_str()).await {
            if is_feed(&body) {
                tracing::debug!(site_url, "Site URL is itself a feed");
                return Some(base.to_string());
            }
            if let Some(feed_url) = alternate_feed_link(&body, &base) {
                tracing::debug!(site_url, feed_url, "Found feed link in page");
                return Some(feed_url);
            }
        }

        for path in CONVENTIONAL_PATHS {
            let Ok(candidate) = base.join(path) else {
                continue;
            };
            if let Some(body) = self.fetch_text(candidate.as_str()).await {
                if is_feed(&body) {
                    tracing::debug!(site_url, feed_url = %candidate, "Found feed at conventional path");
                    return Some(candidate.to_string());
                }
            }
        }

        tracing::info!(site_url, "No feed found");
        None
    }

    async fn fetch_text(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url, error = %e, "Discovery fetch failed");
                return None;
            }
        };
        if !response.status().is_success() {
            return None;
        }
        response.text().await.ok()
    }
}

impl Default for FeedDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

fn is_feed(body: &str) -> bool {
    parse_feed(body, 1).is_ok()
}

/// First `<link rel="alternate">` advertising an RSS or Atom type, made absolute.
pub(crate) fn alternate_feed_link(html: &str, base: &Url) -> Option<String> {
    let selector = Selector::parse(r#"link[rel="alternate"]"#).expect("static selector");
    let document = Html::parse_document(html);

    document
        .select(&selector)
        .filter(|el| {
            el.value()
                .attr("type")
                .map(|t| FEED_MIME_TYPES.contains(&t.trim().to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .find_map(|el| el.value().attr("href"))
        .and_then(|href| base.join(href.trim()).ok())
        .map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title><item><title>a</title><link>https://e.com/a</link></item></channel></rss>"#;

    fn page(head: &str) -> String {
        format!("<!doctype html><html><head><title>Site</title>{head}</head><body><p>hello</p></body></html>")
    }

    #[test]
    fn resolves_relative_alternate_link() {
        let base = Url::parse("https://example.com/blog/").unwrap();
        let html = page(
            r#"<link rel="stylesheet" href="/style.css">
               <link rel="alternate" type="text/html" href="/other">
               <link rel="alternate" type="application/atom+xml" href="atom.xml">"#,
        );
        assert_eq!(
            alternate_feed_link(&html, &base).as_deref(),
            Some("https://example.com/blog/atom.xml")
        );
    }

    #[test]
    fn ignores_pages_without_feed_links() {
        let base = Url::parse("https://example.com").unwrap();
        assert!(alternate_feed_link(&page(""), &base).is_none());
    }

    #[tokio::test]
    async fn url_that_is_a_feed_is_returned_as_is() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;

        let url = format!("{}/feed.rss", server.uri());
        assert_eq!(FeedDiscovery::new().discover(&url).await, Some(url));
    }

    #[tokio::test]
    async fn finds_feed_advertised_in_page_head() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(
                r#"<link rel="alternate" type="application/rss+xml" href="/news/rss">"#,
            )))
            .mount(&server)
            .await;

        let found = FeedDiscovery::new().discover(&server.uri()).await;
        assert_eq!(found, Some(format!("{}/news/rss", server.uri())));
    }

    #[tokio::test]
    async fn tries_conventional_paths_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page("")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page("")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .expect(0)
            .mount(&server)
            .await;

        let found = FeedDiscovery::new().discover(&server.uri()).await;
        assert_eq!(found, Some(format!("{}/rss", server.uri())));
    }

    #[tokio::test]
    async fn returns_none_when_nothing_responds() {
        let server = MockServer::start().await;
        assert!(FeedDiscovery::new().discover(&server.uri()).await.is_none());
        assert!(FeedDiscovery::new().discover("not a url").await.is_none());
    }
}
