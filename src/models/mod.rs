mod account;
mod article;
mod draft;
mod post;
mod prompt_rule;
mod run;
mod source;
mod summary;

pub use account::{Account, NewAccount, OAuthState};
pub use article::{Article, ScrapedArticle};
pub use draft::{AuthoredDraft, Draft, DraftState, DraftStatus};
pub use post::{NewPost, Post, PostStatus};
pub use prompt_rule::{NewPromptRule, PromptRule, RuleKind};
pub use run::{Run, RunOutcome, RunStatus};
pub use source::{NewSource, SelectorSet, Source, Strategy};
pub use summary::ArticleSummary;
