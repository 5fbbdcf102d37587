use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => RunStatus::Success,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Running,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Run {
    pub id: i64,
    pub source_id: i64,
    pub status: RunStatus,
    pub articles_found: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Result of one orchestrated scrape, reported back to the trigger.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub source_id: i64,
    pub source_name: String,
    pub run_id: Option<i64>,
    pub status: RunStatus,
    pub articles_found: usize,
    pub error_message: Option<String>,
}

impl RunOutcome {
    pub fn failed(source_id: i64, source_name: impl Into<String>, run_id: Option<i64>, error: impl ToString) -> Self {
        Self {
            source_id,
            source_name: source_name.into(),
            run_id,
            status: RunStatus::Failed,
            articles_found: 0,
            error_message: Some(error.to_string()),
        }
    }
}
