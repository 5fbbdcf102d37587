use crate::db::Store;
use crate::models::{PromptRule, RuleKind};

/// Base instruction with the account's active rules of `kind` appended.
/// A failed lookup leaves the base instruction unchanged.
pub async fn layered_prompt(store: &dyn Store, account_id: i64, kind: RuleKind, base: &str) -> String {
    match store.active_prompt_rules(account_id, kind).await {
        Ok(rules) => append_rules(base, &rules),
        Err(e) => {
            tracing::warn!(account_id, kind = kind.as_str(), error = %e, "Failed to load prompt rules");
            base.to_string()
        }
    }
}

pub fn append_rules(base: &str, rules: &[PromptRule]) -> String {
    if rules.is_empty() {
        return base.to_string();
    }

    let custom = rules
        .iter()
        .map(|rule| format!("**{}**:\n{}", rule.name, rule.prompt_text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{base}\n\n## Additional Rules:\n\n{custom}")
}
