/// Which prompt family a custom rule extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Analysis,
    Publication,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Analysis => "analysis",
            RuleKind::Publication => "publication",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptRule {
    pub id: i64,
    pub account_id: i64,
    pub kind: RuleKind,
    pub name: String,
    pub prompt_text: String,
    pub priority: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewPromptRule {
    pub account_id: i64,
    pub kind: RuleKind,
    pub name: String,
    pub prompt_text: String,
    pub priority: i64,
}
