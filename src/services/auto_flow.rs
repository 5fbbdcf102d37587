//! Draft-then-publish without a human in the loop.

use std::sync::Arc;

use super::content_fetcher::ContentFetcher;
use super::publisher::Publisher;
use crate::ai::prompts::{full_content_user_prompt, AUTHORING_SYSTEM_PROMPT};
use crate::ai::rules::layered_prompt;
use crate::ai::{draft_post, summarize, TextProvider};
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{Article, AuthoredDraft, Post, RuleKind};

#[derive(Clone)]
pub struct AutoFlow {
    store: Arc<dyn Store>,
    provider: Arc<dyn TextProvider>,
    fetcher: Arc<ContentFetcher>,
    publisher: Publisher,
}

impl AutoFlow {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn TextProvider>,
        fetcher: Arc<ContentFetcher>,
        publisher: Publisher,
    ) -> Self {
        Self {
            store,
            provider,
            fetcher,
            publisher,
        }
    }

    /// Full body (cached or fetched), post text with hashtags from the
    /// account's publication prompt, then a bullet summary.
    ///
    /// Fails only when the post text cannot be authored.
    pub async fn author(&self, article: &Article, account_id: i64) -> Result<AuthoredDraft> {
        let content = self.fetcher.content_for(self.store.as_ref(), article).await;

        let system_prompt =
            layered_prompt(self.store.as_ref(), account_id, RuleKind::Publication, AUTHORING_SYSTEM_PROMPT).await;
        let user_prompt = full_content_user_prompt(&article.title, &content, article.summary.as_deref());

        let post = draft_post(self.provider.as_ref(), &system_prompt, &user_prompt).await?;
        let summary = summarize(self.provider.as_ref(), &article.title, &content).await;

        Ok(AuthoredDraft {
            text: post.text,
            hashtags: post.hashtags,
            summary: Some(summary),
        })
    }

    /// Author, approve and publish one eligible article.
    ///
    /// An authoring failure returns before the draft or article is touched.
    /// After that the article always ends processed; a failed publish leaves
    /// the draft approved with a failed Post recorded.
    pub async fn process_eligible_article(&self, article_id: i64, draft_id: i64, account_id: i64) -> Result<Post> {
        let article = self
            .store
            .article(article_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("article {article_id}")))?;

        let authored = self.author(&article, account_id).await?;
        let text = authored.compose();

        let mut draft = self
            .store
            .draft(draft_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("draft {draft_id}")))?;
        draft.approve(authored, None)?;
        self.store.save_draft(&draft).await?;

        let post = self.publisher.publish(account_id, Some(draft_id), &text).await;
        self.store.mark_article_processed(article_id).await?;
        let post = post?;

        if post.is_published() {
            tracing::info!(article_id, draft_id, post_id = post.id, "Auto-published article");
        } else {
            tracing::warn!(article_id, draft_id, post_id = post.id, "Auto-publish failed, draft left approved");
        }
        Ok(post)
    }
}
