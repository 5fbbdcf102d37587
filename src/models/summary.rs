use serde::{Deserialize, Serialize};

/// Bullet-point digest of an article, stored alongside the draft.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub bullets: Vec<String>,
}

impl ArticleSummary {
    pub fn single(bullet: impl Into<String>) -> Self {
        Self {
            bullets: vec![bullet.into()],
        }
    }
}
