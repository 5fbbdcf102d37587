use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::feed::{FeedDiscovery, FeedScraper, HtmlScraper, Scrape};
use crate::models::{RunOutcome, RunStatus, ScrapedArticle, Source, Strategy};

/// Scrapes sources and persists what is new.
pub struct Runner {
    store: Arc<dyn Store>,
    feed: Arc<dyn Scrape>,
    html: Arc<dyn Scrape>,
    discovery: Arc<FeedDiscovery>,
}

impl Runner {
    pub fn new(store: Arc<dyn Store>, feed_max_items: usize) -> Self {
        Self::with_strategies(
            store,
            Arc::new(FeedScraper::new(feed_max_items)),
            Arc::new(HtmlScraper::new()),
            Arc::new(FeedDiscovery::new()),
        )
    }

    pub fn with_strategies(
        store: Arc<dyn Store>,
        feed: Arc<dyn Scrape>,
        html: Arc<dyn Scrape>,
        discovery: Arc<FeedDiscovery>,
    ) -> Self {
        Self {
            store,
            feed,
            html,
            discovery,
        }
    }

    /// Scrape every active source, one after another.
    pub async fn run_all(&self) -> Vec<RunOutcome> {
        let sources = match self.store.active_sources().await {
            Ok(sources) => sources,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load active sources");
                return Vec::new();
            }
        };

        tracing::info!(count = sources.len(), "Starting scrape of active sources");

        let outcomes: Vec<RunOutcome> = stream::iter(sources)
            .then(|source| self.run_site(source.id))
            .collect()
            .await;

        let new_articles: usize = outcomes.iter().map(|o| o.articles_found).sum();
        let failed = outcomes.iter().filter(|o| o.status == RunStatus::Failed).count();
        tracing::info!(sources = outcomes.len(), new_articles, failed, "Scrape finished");

        outcomes
    }

    pub async fn run_site(&self, source_id: i64) -> RunOutcome {
        let source = match self.store.source(source_id).await {
            Ok(Some(source)) => source,
            Ok(None) => return RunOutcome::failed(source_id, "Unknown", None, "Source not found"),
            Err(e) => return RunOutcome::failed(source_id, "Unknown", None, e),
        };

        let run_id = match self.store.start_run(source.id).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(source_id, error = %e, "Failed to create run");
                return RunOutcome::failed(source.id, &source.name, None, e);
            }
        };

        match self.scrape_and_store(&source).await {
            Ok(inserted) => {
                self.finish(run_id, RunStatus::Success, inserted, None).await;
                tracing::info!(source_id, run_id, inserted, "Source scraped");
                RunOutcome {
                    source_id: source.id,
                    source_name: source.name,
                    run_id: Some(run_id),
                    status: RunStatus::Success,
                    articles_found: inserted,
                    error_message: None,
                }
            }
            Err(e) => {
                let message = e.to_string();
                self.finish(run_id, RunStatus::Failed, 0, Some(message.clone())).await;
                tracing::warn!(source_id, run_id, error = %message, "Source scrape failed");
                RunOutcome::failed(source.id, source.name, Some(run_id), message)
            }
        }
    }

    /// Run the source's strategy without persisting anything.
    pub async fn preview(&self, source: &Source, max_items: usize) -> Vec<ScrapedArticle> {
        match source.strategy {
            Strategy::Feed => self.feed.preview(source, max_items).await,
            Strategy::Html => self.html.preview(source, max_items).await,
            Strategy::Auto => {
                let source = self.with_discovered_feed(source, false).await;
                let articles = self.feed.preview(&source, max_items).await;
                if articles.is_empty() && source.selectors.is_some() {
                    return self.html.preview(&source, max_items).await;
                }
                articles
            }
        }
    }

    pub async fn preview_site(&self, source_id: i64, max_items: usize) -> Result<Vec<ScrapedArticle>> {
        let source = self
            .store
            .source(source_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("source {source_id}")))?;
        Ok(self.preview(&source, max_items).await)
    }

    async fn scrape_and_store(&self, source: &Source) -> Result<usize> {
        let articles = self.scrape(source).await;

        let inserted = if articles.is_empty() {
            0
        } else {
            self.store
                .insert_articles_ignore_duplicates(source.id, articles)
                .await?
        };

        self.store.touch_source_scraped(source.id).await?;
        Ok(inserted)
    }

    async fn scrape(&self, source: &Source) -> Vec<ScrapedArticle> {
        match source.strategy {
            Strategy::Feed => self.feed.scrape(source).await,
            Strategy::Html => self.html.scrape(source).await,
            Strategy::Auto => {
                let source = self.with_discovered_feed(source, true).await;
                let articles = self.feed.scrape(&source).await;
                if !articles.is_empty() {
                    return articles;
                }
                if source.selectors.is_some() {
                    tracing::debug!(source_id = source.id, "Feed empty, falling back to HTML");
                    return self.html.scrape(&source).await;
                }
                Vec::new()
            }
        }
    }

    /// For auto sources without a feed URL, try to discover one. A found URL
    /// is persisted when `persist` is set.
    async fn with_discovered_feed(&self, source: &Source, persist: bool) -> Source {
        let mut source = source.clone();
        if source.feed_url.is_some() {
            return source;
        }

        if let Some(feed_url) = self.discovery.discover(&source.url).await {
            if persist {
                if let Err(e) = self.store.set_source_feed_url(source.id, &feed_url).await {
                    tracing::warn!(source_id = source.id, error = %e, "Failed to save discovered feed URL");
                }
            }
            source.feed_url = Some(feed_url);
        }
        source
    }

    async fn finish(&self, run_id: i64, status: RunStatus, found: usize, error: Option<String>) {
        if let Err(e) = self.store.finish_run(run_id, status, found, error).await {
            tracing::error!(run_id, error = %e, "Failed to finalize run");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Repository;
    use crate::models::{NewSource, SelectorSet};
    use crate::testing::seeded;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Returns a fixed list and records which sources it saw.
    struct FixedScrape {
        articles: Vec<ScrapedArticle>,
        seen: Mutex<Vec<i64>>,
    }

    impl FixedScrape {
        fn new(urls: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                articles: urls
                    .iter()
                    .map(|url| ScrapedArticle {
                        url: url.to_string(),
                        title: format!("Title {url}"),
                        summary: None,
                        published_at: None,
                    })
                    .collect(),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Scrape for FixedScrape {
        async fn scrape(&self, source: &Source) -> Vec<ScrapedArticle> {
            self.seen.lock().unwrap().push(source.id);
            self.articles.clone()
        }

        async fn preview(&self, source: &Source, max_items: usize) -> Vec<ScrapedArticle> {
            self.seen.lock().unwrap().push(source.id);
            self.articles.iter().take(max_items).cloned().collect()
        }
    }

    fn runner(repo: Arc<Repository>, feed: Arc<FixedScrape>, html: Arc<FixedScrape>) -> Runner {
        Runner::with_strategies(repo, feed, html, Arc::new(FeedDiscovery::new()))
    }

    #[tokio::test]
    async fn second_run_inserts_nothing_new() {
        let (repo, _, source_id) = seeded().await;
        let repo = Arc::new(repo);
        let feed = FixedScrape::new(&["https://e.com/a", "https://e.com/b"]);
        let runner = runner(repo.clone(), feed, FixedScrape::new(&[]));

        let first = runner.run_site(source_id).await;
        let second = runner.run_site(source_id).await;

        assert_eq!(first.status, RunStatus::Success);
        assert_eq!(first.articles_found, 2);
        assert_eq!(second.articles_found, 0);
        assert_eq!(repo.count_articles(source_id).await.unwrap(), 2);

        let runs = repo.runs_for_source(source_id).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.status == RunStatus::Success && r.finished_at.is_some()));
        assert!(repo.source(source_id).await.unwrap().unwrap().last_scraped_at.is_some());
    }

    #[tokio::test]
    async fn missing_source_fails_without_run() {
        let (repo, _, _) = seeded().await;
        let runner = runner(Arc::new(repo), FixedScrape::new(&[]), FixedScrape::new(&[]));

        let outcome = runner.run_site(999).await;
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.run_id, None);
        assert_eq!(outcome.error_message.as_deref(), Some("Source not found"));
    }

    #[tokio::test]
    async fn run_all_covers_every_active_source() {
        let (repo, account_id, first) = seeded().await;
        let second = repo
            .insert_source(NewSource::new(account_id, "Other", "https://other.com", Strategy::Feed))
            .await
            .unwrap();
        let inactive = repo
            .insert_source(NewSource::new(account_id, "Off", "https://off.com", Strategy::Feed))
            .await
            .unwrap();
        repo.set_source_active(inactive, false).await.unwrap();

        let feed = FixedScrape::new(&["https://e.com/shared"]);
        let runner = runner(Arc::new(repo), feed.clone(), FixedScrape::new(&[]));

        let outcomes = runner.run_all().await;
        let ids: Vec<i64> = outcomes.iter().map(|o| o.source_id).collect();
        assert_eq!(ids, vec![first, second]);
        // Dedup key is per source, so the same URL lands once in each
        assert!(outcomes.iter().all(|o| o.articles_found == 1));
        assert_eq!(feed.calls(), 2);
    }

    #[tokio::test]
    async fn auto_falls_back_to_html_when_feed_is_empty() {
        let (repo, account_id, _) = seeded().await;
        let mut source = NewSource::new(account_id, "Auto", "https://auto.example", Strategy::Auto);
        source.feed_url = Some("https://auto.example/feed".to_string());
        source.selectors = Some(SelectorSet {
            article: "article".to_string(),
            title: "h2".to_string(),
            summary: "p".to_string(),
            link: "a".to_string(),
        });
        let source_id = repo.insert_source(source).await.unwrap();

        let feed = FixedScrape::new(&[]);
        let html = FixedScrape::new(&["https://auto.example/html-1"]);
        let runner = runner(Arc::new(repo), feed.clone(), html.clone());

        let outcome = runner.run_site(source_id).await;
        assert_eq!(outcome.articles_found, 1);
        assert_eq!(feed.calls(), 1);
        assert_eq!(html.calls(), 1);
    }

    #[tokio::test]
    async fn auto_without_feed_discovers_and_persists_it() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head><link rel="alternate" type="application/rss+xml" href="/rss.xml"></head></html>"#,
            ))
            .mount(&server)
            .await;

        let (repo, account_id, _) = seeded().await;
        let source_id = repo
            .insert_source(NewSource::new(account_id, "Auto", server.uri(), Strategy::Auto))
            .await
            .unwrap();
        let repo = Arc::new(repo);
        let runner = runner(repo.clone(), FixedScrape::new(&["https://x.example/1"]), FixedScrape::new(&[]));

        runner.run_site(source_id).await;

        let stored = repo.source(source_id).await.unwrap().unwrap();
        assert_eq!(stored.feed_url, Some(format!("{}/rss.xml", server.uri())));
    }

    #[tokio::test]
    async fn preview_does_not_persist() {
        let (repo, _, source_id) = seeded().await;
        let repo = Arc::new(repo);
        let runner = runner(
            repo.clone(),
            FixedScrape::new(&["https://e.com/1", "https://e.com/2", "https://e.com/3"]),
            FixedScrape::new(&[]),
        );

        let preview = runner.preview_site(source_id, 2).await.unwrap();
        assert_eq!(preview.len(), 2);
        assert_eq!(repo.count_articles(source_id).await.unwrap(), 0);
        assert!(repo.runs_for_source(source_id).await.unwrap().is_empty());
    }
}
