use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    Account, Article, Draft, NewAccount, NewPost, OAuthState, Post, PromptRule, RuleKind,
    RunStatus, ScrapedArticle, Source,
};

/// Persistence operations the pipeline depends on.
///
/// Services receive an `Arc<dyn Store>` rather than reaching for a shared
/// handle, so any backend (or a test double) can be swapped in.
#[async_trait]
pub trait Store: Send + Sync {
    // Sources

    async fn active_sources(&self) -> Result<Vec<Source>>;
    async fn source(&self, id: i64) -> Result<Option<Source>>;
    async fn sources_for_account(&self, account_id: i64) -> Result<Vec<Source>>;
    async fn touch_source_scraped(&self, id: i64) -> Result<()>;
    async fn set_source_feed_url(&self, id: i64, feed_url: &str) -> Result<()>;

    // Runs

    async fn start_run(&self, source_id: i64) -> Result<i64>;
    async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        articles_found: usize,
        error_message: Option<String>,
    ) -> Result<()>;

    // Articles

    /// Inserts with `(source_id, url)` as the conflict key; returns how many rows were new.
    async fn insert_articles_ignore_duplicates(
        &self,
        source_id: i64,
        articles: Vec<ScrapedArticle>,
    ) -> Result<usize>;
    async fn article(&self, id: i64) -> Result<Option<Article>>;
    /// Unprocessed articles of the given sources, oldest first.
    async fn unprocessed_articles(&self, source_ids: &[i64]) -> Result<Vec<Article>>;
    async fn mark_article_processed(&self, id: i64) -> Result<()>;
    async fn cache_article_content(&self, id: i64, content: &str) -> Result<()>;

    // Drafts

    async fn article_ids_with_drafts(&self, article_ids: &[i64]) -> Result<HashSet<i64>>;
    async fn insert_pending_draft(&self, article_id: i64, account_id: i64) -> Result<Draft>;
    /// The article's pending or approved draft for this account, if any.
    async fn open_draft(&self, article_id: i64, account_id: i64) -> Result<Option<Draft>>;
    async fn draft(&self, id: i64) -> Result<Option<Draft>>;
    async fn save_draft(&self, draft: &Draft) -> Result<()>;

    // Posts

    async fn insert_post(&self, post: NewPost) -> Result<Post>;

    // Accounts

    async fn account(&self, id: i64) -> Result<Option<Account>>;
    async fn update_account_tokens(
        &self,
        id: i64,
        access_token_enc: &str,
        refresh_token_enc: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
    async fn upsert_account(&self, account: NewAccount) -> Result<i64>;
    async fn delete_account(&self, id: i64) -> Result<()>;

    // Prompt rules

    /// Active rules of one kind, ordered by ascending priority.
    async fn active_prompt_rules(&self, account_id: i64, kind: RuleKind) -> Result<Vec<PromptRule>>;

    // OAuth state

    async fn insert_oauth_state(&self, state: OAuthState) -> Result<()>;
    async fn oauth_state(&self, id: &str) -> Result<Option<OAuthState>>;
    async fn delete_oauth_state(&self, id: &str) -> Result<()>;
}
