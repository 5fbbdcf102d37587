use std::sync::Arc;

use super::social::{SocialClient, XSettings};
use super::CredentialVault;
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{DraftState, NewPost, Post};

/// Publishes text for an account and records every attempt as a Post.
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn Store>,
    vault: CredentialVault,
    settings: XSettings,
}

impl Publisher {
    pub fn new(store: Arc<dyn Store>, vault: CredentialVault, settings: XSettings) -> Self {
        Self { store, vault, settings }
    }

    /// Publish `content`. Platform failures come back as a `failed` Post,
    /// not as an error; only store failures and unknown accounts are errors.
    /// A successful publish advances the linked draft to posted.
    pub async fn publish(&self, account_id: i64, draft_id: Option<i64>, content: &str) -> Result<Post> {
        let account = self
            .store
            .account(account_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("account {account_id}")))?;

        let attempt = match SocialClient::for_account(&account, self.store.clone(), self.vault.clone(), self.settings.clone()) {
            Ok(mut client) => client.post(content).await,
            Err(e) => Err(e),
        };

        let post = match attempt {
            Ok(published) => {
                self.store
                    .insert_post(NewPost::published(
                        account_id,
                        draft_id,
                        content.to_string(),
                        published.id,
                        published.url,
                    ))
                    .await?
            }
            Err(e) => {
                tracing::warn!(account_id, draft_id, error = %e, "Publish failed");
                return self
                    .store
                    .insert_post(NewPost::failed(account_id, draft_id, content.to_string(), e.to_string()))
                    .await;
            }
        };

        if let Some(draft_id) = draft_id {
            self.advance_draft(draft_id, post.id).await?;
        }

        Ok(post)
    }

    /// Publish an approved draft's composed text. This is the retry path for
    /// drafts whose earlier publish failed.
    pub async fn publish_draft(&self, draft_id: i64) -> Result<Post> {
        let draft = self
            .store
            .draft(draft_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("draft {draft_id}")))?;

        let content = match &draft.state {
            DraftState::Approved(content) => content.compose(),
            other => {
                return Err(AppError::InvalidTransition(format!(
                    "cannot publish draft {} from {}",
                    draft.id,
                    other.status().as_str()
                )))
            }
        };

        self.publish(draft.account_id, Some(draft.id), &content).await
    }

    async fn advance_draft(&self, draft_id: i64, post_id: i64) -> Result<()> {
        let Some(mut draft) = self.store.draft(draft_id).await? else {
            tracing::warn!(draft_id, "Published draft no longer exists");
            return Ok(());
        };

        if let Err(e) = draft.mark_posted(post_id) {
            tracing::warn!(draft_id, error = %e, "Draft not advanced after publish");
            return Ok(());
        }
        self.store.save_draft(&draft).await
    }
}
