use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::text::{collapse_whitespace, truncate_chars};
use super::{Scrape, BROWSER_USER_AGENT, DEFAULT_MAX_ITEMS, SUMMARY_MAX_CHARS};
use crate::models::{ScrapedArticle, SelectorSet, Source};

const POLITE_DELAY: Duration = Duration::from_secs(2);

/// CSS-selector strategy for sites without a feed.
pub struct HtmlScraper {
    client: Client,
    delay: Duration,
    max_items: usize,
}

impl HtmlScraper {
    pub fn new() -> Self {
        Self::with_delay(POLITE_DELAY)
    }

    pub fn with_delay(delay: Duration) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            delay,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    pub async fn scrape_page(
        &self,
        page_url: &str,
        selectors: &SelectorSet,
        max_items: usize,
    ) -> Vec<ScrapedArticle> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let html = match self.fetch_page(page_url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(page_url, error = %e, "Failed to fetch page");
                return Vec::new();
            }
        };

        let articles = parse_html(&html, page_url, selectors, max_items);
        tracing::debug!(page_url, count = articles.len(), "Scraped page");
        articles
    }

    async fn fetch_page(&self, page_url: &str) -> crate::error::Result<String> {
        let response = self
            .client
            .get(page_url)
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

impl Default for HtmlScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scrape for HtmlScraper {
    async fn scrape(&self, source: &Source) -> Vec<ScrapedArticle> {
        self.preview(source, self.max_items).await
    }

    async fn preview(&self, source: &Source, max_items: usize) -> Vec<ScrapedArticle> {
        match &source.selectors {
            Some(selectors) => self.scrape_page(&source.url, selectors, max_items).await,
            None => {
                tracing::debug!(source_id = source.id, "Source has no selectors");
                Vec::new()
            }
        }
    }
}

struct CompiledSelectors {
    article: Selector,
    title: Selector,
    summary: Selector,
    link: Selector,
}

impl CompiledSelectors {
    fn compile(set: &SelectorSet) -> Option<Self> {
        let parse = |css: &str| match Selector::parse(css) {
            Ok(selector) => Some(selector),
            Err(e) => {
                tracing::warn!(selector = css, error = %e, "Invalid CSS selector");
                None
            }
        };

        Some(Self {
            article: parse(&set.article)?,
            title: parse(&set.title)?,
            summary: parse(&set.summary)?,
            link: parse(&set.link)?,
        })
    }
}

/// Extract articles from a page. Blocks with an empty title or an
/// unresolvable link are skipped.
pub fn parse_html(
    html: &str,
    base_url: &str,
    selectors: &SelectorSet,
    max_items: usize,
) -> Vec<ScrapedArticle> {
    let Some(compiled) = CompiledSelectors::compile(selectors) else {
        return Vec::new();
    };
    let base = Url::parse(base_url).ok();
    let document = Html::parse_document(html);

    document
        .select(&compiled.article)
        .take(max_items)
        .filter_map(|block| extract_block(block, &compiled, base.as_ref()))
        .collect()
}

fn extract_block(
    block: ElementRef<'_>,
    selectors: &CompiledSelectors,
    base: Option<&Url>,
) -> Option<ScrapedArticle> {
    let title = first_text(block, &selectors.title).filter(|t| !t.is_empty())?;

    let link = block.select(&selectors.link).next()?;
    let raw_href = match link.value().attr("href") {
        Some(href) => href.trim().to_string(),
        None => element_text(link),
    };
    if raw_href.is_empty() {
        return None;
    }

    let url = match base {
        Some(base) => base.join(&raw_href),
        None => Url::parse(&raw_href),
    };
    let url = match url {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::debug!(href = %raw_href, error = %e, "Skipping unresolvable link");
            return None;
        }
    };

    let summary = first_text(block, &selectors.summary)
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(&s, SUMMARY_MAX_CHARS));

    Some(ScrapedArticle {
        url,
        title,
        summary,
        published_at: None,
    })
}

fn first_text(block: ElementRef<'_>, selector: &Selector) -> Option<String> {
    block.select(selector).next().map(element_text)
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Strategy;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn selectors() -> SelectorSet {
        SelectorSet {
            article: "div.story".to_string(),
            title: "h2".to_string(),
            summary: "p.lede".to_string(),
            link: "a".to_string(),
        }
    }

    const PAGE: &str = r#"<html><body>
        <div class="story">
            <h2> Valid   story </h2>
            <a href="/news/valid">Read</a>
            <p class="lede">The lede.</p>
        </div>
        <div class="story">
            <h2>   </h2>
            <a href="/news/empty-title">Read</a>
        </div>
        <div class="story">
            <h2>No link story</h2>
            <p class="lede">Nothing to click.</p>
        </div>
    </body></html>"#;

    #[test]
    fn keeps_only_complete_blocks() {
        let articles = parse_html(PAGE, "https://example.com/section/", &selectors(), 20);

        assert_eq!(
            articles,
            vec![ScrapedArticle {
                url: "https://example.com/news/valid".to_string(),
                title: "Valid story".to_string(),
                summary: Some("The lede.".to_string()),
                published_at: None,
            }]
        );
    }

    #[test]
    fn falls_back_to_link_text_when_href_missing() {
        let html = r#"<ul><li class="s"><b>Title</b><span class="u">https://other.org/x</span></li></ul>"#;
        let set = SelectorSet {
            article: "li.s".to_string(),
            title: "b".to_string(),
            summary: "em".to_string(),
            link: "span.u".to_string(),
        };
        let articles = parse_html(html, "https://example.com", &set, 20);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://other.org/x");
        assert_eq!(articles[0].summary, None);
    }

    #[test]
    fn summary_is_capped() {
        let long = "x".repeat(900);
        let html = format!(
            r#"<div class="story"><h2>T</h2><a href="https://e.com/1">r</a><p class="lede">{long}</p></div>"#
        );
        let articles = parse_html(&html, "https://e.com", &selectors(), 20);
        assert_eq!(articles[0].summary.as_ref().map(|s| s.len()), Some(SUMMARY_MAX_CHARS));
    }

    #[test]
    fn invalid_selector_yields_nothing() {
        let mut set = selectors();
        set.article = "div[".to_string();
        assert!(parse_html(PAGE, "https://example.com", &set, 20).is_empty());
    }

    #[tokio::test]
    async fn scrapes_source_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let source = Source {
            id: 3,
            account_id: 1,
            name: "Html".to_string(),
            url: server.uri(),
            strategy: Strategy::Html,
            feed_url: None,
            selectors: Some(selectors()),
            scrape_interval_hours: 4,
            is_active: true,
            auto_publish: false,
            last_scraped_at: None,
            created_at: Utc::now(),
        };

        let articles = HtmlScraper::with_delay(Duration::ZERO).scrape(&source).await;
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, format!("{}/news/valid", server.uri()));
    }

    #[tokio::test]
    async fn http_errors_yield_empty_list() {
        let server = MockServer::start().await;
        let scraper = HtmlScraper::with_delay(Duration::ZERO);
        let articles = scraper.scrape_page(&server.uri(), &selectors(), 20).await;
        assert!(articles.is_empty());
    }
}
