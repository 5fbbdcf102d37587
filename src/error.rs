use thiserror::Error;

/// Statuses that make retrying the rest of a batch pointless (bad key,
/// exhausted credits, forbidden).
const FATAL_STATUSES: [u16; 3] = [400, 401, 403];

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential error: {0}")]
    Crypto(String),

    #[error("{provider} API error{}: {message}", status_suffix(.status))]
    Provider {
        provider: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("X API error{}: {message}", status_suffix(.status))]
    SocialApi { status: Option<u16>, message: String },

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Unparseable AI response: {0}")]
    ResponseParse(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid draft transition: {0}")]
    InvalidTransition(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl AppError {
    /// HTTP status carried by a provider or platform failure, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            AppError::Provider { status, .. } | AppError::SocialApi { status, .. } => *status,
            AppError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.http_status()
            .is_some_and(|status| FATAL_STATUSES.contains(&status))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
