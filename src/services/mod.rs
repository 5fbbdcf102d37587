mod auto_flow;
mod content_fetcher;
mod oauth;
pub mod pipeline;
mod publisher;
mod runner;
mod social;
mod suggestions;
mod vault;

pub use auto_flow::AutoFlow;
pub use content_fetcher::{extract_content, ArticleContent, ContentFetcher};
pub use oauth::{AuthorizationRequest, ConnectedAccount, OAuthService};
pub use publisher::Publisher;
pub use runner::Runner;
pub use social::{PublishedPost, SocialClient, XSettings};
pub use suggestions::{ProcessingReport, SuggestionService};
pub use vault::CredentialVault;
