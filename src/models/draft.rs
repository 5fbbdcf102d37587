use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ArticleSummary;
use crate::error::{AppError, Result};

/// Column value of the draft's state, as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Pending,
    Approved,
    Rejected,
    Posted,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::Pending => "pending",
            DraftStatus::Approved => "approved",
            DraftStatus::Rejected => "rejected",
            DraftStatus::Posted => "posted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DraftStatus::Pending),
            "approved" => Some(DraftStatus::Approved),
            "rejected" => Some(DraftStatus::Rejected),
            "posted" => Some(DraftStatus::Posted),
            _ => None,
        }
    }
}

/// Post text produced by the authoring step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthoredDraft {
    pub text: String,
    pub hashtags: Vec<String>,
    pub summary: Option<ArticleSummary>,
}

impl AuthoredDraft {
    /// Text sent to the platform: body, a newline, then hashtags, clamped to 280 chars.
    pub fn compose(&self) -> String {
        let full = if self.hashtags.is_empty() {
            self.text.clone()
        } else {
            format!("{}\n{}", self.text, self.hashtags.join(" "))
        };
        full.chars().take(crate::ai::MAX_POST_CHARS).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DraftState {
    /// Eligible but not yet authored.
    Pending,
    /// Authored; either awaiting publication or publication failed.
    Approved(AuthoredDraft),
    Rejected,
    Posted { content: AuthoredDraft, post_id: i64 },
}

impl DraftState {
    pub fn status(&self) -> DraftStatus {
        match self {
            DraftState::Pending => DraftStatus::Pending,
            DraftState::Approved(_) => DraftStatus::Approved,
            DraftState::Rejected => DraftStatus::Rejected,
            DraftState::Posted { .. } => DraftStatus::Posted,
        }
    }

    pub fn content(&self) -> Option<&AuthoredDraft> {
        match self {
            DraftState::Approved(content) | DraftState::Posted { content, .. } => Some(content),
            DraftState::Pending | DraftState::Rejected => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Draft {
    pub id: i64,
    pub article_id: i64,
    pub account_id: i64,
    pub state: DraftState,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Draft {
    pub fn status(&self) -> DraftStatus {
        self.state.status()
    }

    pub fn approve(&mut self, content: AuthoredDraft, reviewer: Option<&str>) -> Result<()> {
        self.expect_status(DraftStatus::Pending, "approve")?;
        self.state = DraftState::Approved(content);
        self.reviewed_at = Some(Utc::now());
        self.reviewed_by = reviewer.map(str::to_string);
        Ok(())
    }

    pub fn reject(&mut self, reviewer: Option<&str>) -> Result<()> {
        self.expect_status(DraftStatus::Pending, "reject")?;
        self.state = DraftState::Rejected;
        self.reviewed_at = Some(Utc::now());
        self.reviewed_by = reviewer.map(str::to_string);
        Ok(())
    }

    pub fn mark_posted(&mut self, post_id: i64) -> Result<()> {
        match std::mem::replace(&mut self.state, DraftState::Pending) {
            DraftState::Approved(content) => {
                self.state = DraftState::Posted { content, post_id };
                Ok(())
            }
            other => {
                let status = other.status();
                self.state = other;
                Err(AppError::InvalidTransition(format!(
                    "cannot post draft {} from {}",
                    self.id,
                    status.as_str()
                )))
            }
        }
    }

    fn expect_status(&self, expected: DraftStatus, action: &str) -> Result<()> {
        let current = self.status();
        if current == expected {
            Ok(())
        } else {
            Err(AppError::InvalidTransition(format!(
                "cannot {action} draft {} from {}",
                self.id,
                current.as_str()
            )))
        }
    }
}
