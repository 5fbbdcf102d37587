use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::auto_flow::AutoFlow;
use super::pipeline::{drive, BatchQueue, StopOnFatal};
use crate::ai::prompts::ANALYSIS_SYSTEM_PROMPT;
use crate::ai::rules::layered_prompt;
use crate::ai::{analyze, TextProvider};
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{Article, Draft, DraftStatus, RuleKind};

/// Counts from one analysis pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingReport {
    /// Articles the provider was asked about.
    pub processed: usize,
    /// Eligible articles that got a draft.
    pub created: usize,
    /// Ineligible articles, discarded.
    pub skipped: usize,
    pub failed: usize,
}

enum Decision {
    Drafted,
    Discarded,
}

/// Eligibility analysis and the human review of its drafts.
pub struct SuggestionService {
    store: Arc<dyn Store>,
    provider: Arc<dyn TextProvider>,
    auto_flow: AutoFlow,
}

impl SuggestionService {
    pub fn new(store: Arc<dyn Store>, provider: Arc<dyn TextProvider>, auto_flow: AutoFlow) -> Self {
        Self {
            store,
            provider,
            auto_flow,
        }
    }

    /// Analyze the account's unprocessed, undrafted articles oldest first.
    ///
    /// Eligible articles get a pending draft and, when their source
    /// auto-publishes, go straight through the auto-flow. A fatal provider
    /// error stops the whole pass.
    pub async fn process_new_articles(&self, account_id: i64, batch_size: usize) -> Result<ProcessingReport> {
        let sources = self.store.sources_for_account(account_id).await?;
        let auto_publish: HashMap<i64, bool> = sources.iter().map(|s| (s.id, s.auto_publish)).collect();
        let source_ids: Vec<i64> = sources.iter().map(|s| s.id).collect();

        let articles = self.store.unprocessed_articles(&source_ids).await?;
        let article_ids: Vec<i64> = articles.iter().map(|a| a.id).collect();
        let drafted = self.store.article_ids_with_drafts(&article_ids).await?;
        let pending: Vec<Article> = articles
            .into_iter()
            .filter(|a| !drafted.contains(&a.id))
            .collect();

        if pending.is_empty() {
            tracing::debug!(account_id, "No new articles to analyze");
            return Ok(ProcessingReport::default());
        }

        tracing::info!(account_id, articles = pending.len(), batch_size, "Analyzing new articles");

        let analysis_prompt =
            layered_prompt(self.store.as_ref(), account_id, RuleKind::Analysis, ANALYSIS_SYSTEM_PROMPT).await;

        let system_prompt = analysis_prompt.as_str();
        let auto_publish = &auto_publish;
        let stage = drive(BatchQueue::new(pending, batch_size), &StopOnFatal, move |article: Article| {
            let auto = auto_publish.get(&article.source_id).copied().unwrap_or(false);
            self.analyze_article(article, account_id, system_prompt, auto)
        })
        .await;

        let created = stage
            .outputs
            .iter()
            .filter(|d| matches!(d, Decision::Drafted))
            .count();
        let report = ProcessingReport {
            processed: stage.outputs.len() + stage.failed,
            created,
            skipped: stage.outputs.len() - created,
            failed: stage.failed,
        };

        tracing::info!(
            account_id,
            processed = report.processed,
            created = report.created,
            skipped = report.skipped,
            failed = report.failed,
            aborted = stage.aborted,
            "Analysis finished"
        );
        Ok(report)
    }

    async fn analyze_article(
        &self,
        article: Article,
        account_id: i64,
        system_prompt: &str,
        auto_publish: bool,
    ) -> Result<Decision> {
        let summary = article.summary.as_deref().unwrap_or_default();
        let verdict = analyze(self.provider.as_ref(), system_prompt, &article.title, summary).await?;

        if !verdict.eligible {
            tracing::debug!(article_id = article.id, reason = %verdict.reason, "Article not eligible");
            self.store.mark_article_processed(article.id).await?;
            return Ok(Decision::Discarded);
        }

        let draft = self.store.insert_pending_draft(article.id, account_id).await?;
        tracing::debug!(article_id = article.id, draft_id = draft.id, "Draft created");

        if auto_publish {
            if let Err(e) = self
                .auto_flow
                .process_eligible_article(article.id, draft.id, account_id)
                .await
            {
                tracing::warn!(article_id = article.id, draft_id = draft.id, error = %e, "Auto-flow failed");
            }
        }

        Ok(Decision::Drafted)
    }

    /// Pending draft for one article, without asking about eligibility.
    /// An article that already has a pending or approved draft gets that
    /// draft back instead of a second one.
    pub async fn suggest_for_article(&self, article_id: i64) -> Result<Draft> {
        let article = self
            .store
            .article(article_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("article {article_id}")))?;
        let source = self
            .store
            .source(article.source_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("source {}", article.source_id)))?;

        if let Some(existing) = self.store.open_draft(article.id, source.account_id).await? {
            tracing::debug!(article_id, draft_id = existing.id, "Draft already open");
            return Ok(existing);
        }

        let draft = self.store.insert_pending_draft(article.id, source.account_id).await?;
        tracing::info!(article_id, draft_id = draft.id, "Draft requested");
        Ok(draft)
    }

    /// Author a pending draft and approve it. The article becomes processed.
    pub async fn approve_draft(&self, draft_id: i64, reviewer: Option<&str>) -> Result<Draft> {
        let mut draft = self.pending_draft(draft_id).await?;
        let article = self
            .store
            .article(draft.article_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("article {}", draft.article_id)))?;

        let authored = self.auto_flow.author(&article, draft.account_id).await?;
        draft.approve(authored, reviewer)?;
        self.store.save_draft(&draft).await?;
        self.store.mark_article_processed(article.id).await?;

        tracing::info!(draft_id, article_id = article.id, "Draft approved");
        Ok(draft)
    }

    pub async fn reject_draft(&self, draft_id: i64, reviewer: Option<&str>) -> Result<Draft> {
        let mut draft = self.pending_draft(draft_id).await?;
        draft.reject(reviewer)?;
        self.store.save_draft(&draft).await?;
        self.store.mark_article_processed(draft.article_id).await?;

        tracing::info!(draft_id, "Draft rejected");
        Ok(draft)
    }

    async fn pending_draft(&self, draft_id: i64) -> Result<Draft> {
        let draft = self
            .store
            .draft(draft_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("draft {draft_id}")))?;
        if draft.status() != DraftStatus::Pending {
            return Err(AppError::InvalidTransition(format!(
                "draft {} is already {}",
                draft.id,
                draft.status().as_str()
            )));
        }
        Ok(draft)
    }
}
