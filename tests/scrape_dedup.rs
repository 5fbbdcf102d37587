use std::sync::Arc;

use newsdesk::db::{Repository, Store};
use newsdesk::models::{NewAccount, NewSource, RunStatus, Strategy};
use newsdesk::services::{CredentialVault, Runner};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example News</title>
    <link>https://news.example.com</link>
    <item>
      <title>First story</title>
      <link>https://news.example.com/first</link>
      <description>&lt;p&gt;Something happened.&lt;/p&gt;</description>
      <pubDate>Mon, 06 Jan 2025 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Second story</title>
      <link>https://news.example.com/second</link>
      <description>Something else happened.</description>
    </item>
  </channel>
</rss>"#;

async fn repository_with_source(feed_url: String) -> (Arc<Repository>, i64) {
    let repo = Repository::open_in_memory().await.unwrap();
    let vault = CredentialVault::from_hex(KEY).unwrap();
    let account_id = repo
        .upsert_account(NewAccount {
            user_id: "user-1".to_string(),
            platform_user_id: "x-1".to_string(),
            username: "desk".to_string(),
            display_name: None,
            access_token_enc: vault.encrypt("a").unwrap(),
            refresh_token_enc: vault.encrypt("r").unwrap(),
            token_expires_at: None,
        })
        .await
        .unwrap();

    let mut source = NewSource::new(account_id, "Example News", "https://news.example.com", Strategy::Feed);
    source.feed_url = Some(feed_url);
    let source_id = repo.insert_source(source).await.unwrap();
    (Arc::new(repo), source_id)
}

#[tokio::test]
async fn repeated_runs_store_each_article_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .mount(&server)
        .await;

    let (repo, source_id) = repository_with_source(format!("{}/feed.xml", server.uri())).await;
    let runner = Runner::new(repo.clone(), 20);

    let first = runner.run_site(source_id).await;
    assert_eq!(first.status, RunStatus::Success);
    assert_eq!(first.articles_found, 2);

    let second = runner.run_site(source_id).await;
    assert_eq!(second.status, RunStatus::Success);
    assert_eq!(second.articles_found, 0);

    assert_eq!(repo.count_articles(source_id).await.unwrap(), 2);

    let runs = repo.runs_for_source(source_id).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.status == RunStatus::Success && r.finished_at.is_some()));

    let source = repo.source(source_id).await.unwrap().unwrap();
    assert!(source.last_scraped_at.is_some());
}

#[tokio::test]
async fn unreachable_feed_still_finishes_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (repo, source_id) = repository_with_source(format!("{}/feed.xml", server.uri())).await;
    let outcome = Runner::new(repo.clone(), 20).run_all().await;

    assert_eq!(outcome.len(), 1);
    assert_eq!(outcome[0].status, RunStatus::Success);
    assert_eq!(outcome[0].articles_found, 0);
    assert_eq!(repo.count_articles(source_id).await.unwrap(), 0);
}
