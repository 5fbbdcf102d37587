use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::db::Store;
use crate::error::Result;
use crate::feed::text::collapse_whitespace;
use crate::feed::BROWSER_USER_AGENT;
use crate::models::Article;

/// Content containers, most specific first.
const CONTAINER_SELECTORS: [&str; 9] = [
    "article",
    r#"[role="article"]"#,
    ".article-content",
    ".article-body",
    ".entry-content",
    ".post-content",
    ".content",
    "main article",
    "main",
];

const NOISE_SELECTOR: &str = "script, style, nav, footer, aside, .ad, .advertisement";
const BLOCK_SELECTOR: &str = "p, h2, h3, h4, h5, h6, li";

/// Blocks at or under this length are treated as noise.
const MIN_BLOCK_CHARS: usize = 20;
/// Below this the block-based extraction is abandoned for flattened text.
const MIN_CONTENT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleContent {
    pub title: String,
    pub content: String,
}

pub struct ContentFetcher {
    client: Client,
}

impl ContentFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    /// Fetch and extract the readable body of one article. Errors propagate.
    pub async fn fetch(&self, article_url: &str) -> Result<ArticleContent> {
        let response = self
            .client
            .get(article_url)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch {}: HTTP {}", article_url, response.status()).into());
        }

        let html = response.text().await?;
        Ok(extract_content(&html))
    }

    /// Cached body, else a fresh fetch cached back onto the article, else the
    /// summary or title.
    pub async fn content_for(&self, store: &dyn Store, article: &Article) -> String {
        if let Some(content) = article.full_content.as_deref().filter(|c| !c.trim().is_empty()) {
            return content.to_string();
        }

        match self.fetch(&article.url).await {
            Ok(fetched) => {
                if let Err(e) = store.cache_article_content(article.id, &fetched.content).await {
                    tracing::warn!(article_id = article.id, error = %e, "Failed to cache article content");
                }
                fetched.content
            }
            Err(e) => {
                tracing::warn!(article_id = article.id, error = %e, "Falling back to article summary");
                article.fallback_content()
            }
        }
    }
}

impl Default for ContentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Pull the title and main text out of an article page.
pub fn extract_content(html: &str) -> ArticleContent {
    let document = Html::parse_document(html);
    let title = extract_title(&document);

    let container = CONTAINER_SELECTORS
        .iter()
        .find_map(|css| document.select(&selector(css)).next())
        .or_else(|| document.select(&selector("body")).next())
        .unwrap_or_else(|| document.root_element());

    let noise: Vec<ElementRef<'_>> = container.select(&selector(NOISE_SELECTOR)).collect();

    let content = container
        .select(&selector(BLOCK_SELECTOR))
        .filter(|el| !is_within(*el, &noise))
        .map(|el| visible_text(el, &noise).trim().to_string())
        .filter(|text| text.chars().count() > MIN_BLOCK_CHARS)
        .collect::<Vec<_>>()
        .join("\n\n");

    if content.chars().count() >= MIN_CONTENT_CHARS {
        return ArticleContent { title, content };
    }

    let flattened = collapse_whitespace(&visible_text(container, &noise));
    ArticleContent {
        title,
        content: if flattened.is_empty() {
            "No content found".to_string()
        } else {
            flattened
        },
    }
}

fn extract_title(document: &Html) -> String {
    let text_of = |css: &str| {
        document
            .select(&selector(css))
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    };

    text_of("h1")
        .or_else(|| {
            document
                .select(&selector(r#"meta[property="og:title"]"#))
                .next()
                .and_then(|el| el.value().attr("content"))
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
        })
        .or_else(|| text_of("title"))
        .unwrap_or_else(|| "Untitled".to_string())
}

fn is_within(el: ElementRef<'_>, noise: &[ElementRef<'_>]) -> bool {
    noise
        .iter()
        .any(|n| *n == el || el.ancestors().any(|ancestor| **n == ancestor))
}

/// Text under `el`, leaving out anything inside a noise element.
fn visible_text(el: ElementRef<'_>, noise: &[ElementRef<'_>]) -> String {
    el.descendants()
        .filter_map(|node| {
            let text: &str = node.value().as_text()?;
            let hidden = node
                .ancestors()
                .take_while(|ancestor| *ancestor != *el)
                .any(|ancestor| noise.iter().any(|n| **n == ancestor));
            (!hidden).then(|| text.to_string())
        })
        .collect()
}
