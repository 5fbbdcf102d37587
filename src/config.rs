use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Anthropic,
    DeepSeek,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::DeepSeek => "deepseek",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// 32-byte AES key, hex encoded.
    #[serde(default)]
    pub encryption_key: String,

    #[serde(default)]
    pub ai_provider: ProviderKind,
    pub ai_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,

    #[serde(default)]
    pub x_client_id: String,
    #[serde(default)]
    pub x_client_secret: String,
    #[serde(default = "default_callback_url")]
    pub x_callback_url: String,
    #[serde(default = "default_x_api_base")]
    pub x_api_base: String,
    #[serde(default = "default_x_authorize_url")]
    pub x_authorize_url: String,
    #[serde(default = "default_x_web_base")]
    pub x_web_base: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_feed_max_items")]
    pub feed_max_items: usize,
    #[serde(default = "default_scrape_every_hours")]
    pub scrape_every_hours: u64,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newsdesk");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("newsdesk.db").to_string_lossy().to_string()
}

fn default_callback_url() -> String {
    "http://localhost:3001/api/v1/x/oauth/callback".to_string()
}

fn default_x_api_base() -> String {
    "https://api.x.com".to_string()
}

fn default_x_authorize_url() -> String {
    "https://x.com/i/oauth2/authorize".to_string()
}

fn default_x_web_base() -> String {
    "https://x.com".to_string()
}

fn default_batch_size() -> usize {
    5
}

fn default_feed_max_items() -> usize {
    20
}

fn default_scrape_every_hours() -> u64 {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            encryption_key: String::new(),
            ai_provider: ProviderKind::default(),
            ai_model: None,
            openai_api_key: None,
            anthropic_api_key: None,
            deepseek_api_key: None,
            x_client_id: String::new(),
            x_client_secret: String::new(),
            x_callback_url: default_callback_url(),
            x_api_base: default_x_api_base(),
            x_authorize_url: default_x_authorize_url(),
            x_web_base: default_x_web_base(),
            batch_size: default_batch_size(),
            feed_max_items: default_feed_max_items(),
            scrape_every_hours: default_scrape_every_hours(),
        }
    }
}

impl Config {
    /// Load from the default location, writing a default file on first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config.with_env_overrides())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config.with_env_overrides())
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("newsdesk")
            .join("config.toml")
    }

    fn with_env_overrides(mut self) -> Self {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(key) = env("NEWSDESK_ENCRYPTION_KEY") {
            self.encryption_key = key;
        }
        if let Some(key) = env("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(key) = env("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = Some(key);
        }
        if let Some(key) = env("DEEPSEEK_API_KEY") {
            self.deepseek_api_key = Some(key);
        }
        if let Some(id) = env("X_CLIENT_ID") {
            self.x_client_id = id;
        }
        if let Some(secret) = env("X_CLIENT_SECRET") {
            self.x_client_secret = secret;
        }
        self
    }

    /// API key for the configured provider.
    pub fn provider_api_key(&self) -> Option<&str> {
        match self.ai_provider {
            ProviderKind::OpenAi => self.openai_api_key.as_deref(),
            ProviderKind::Anthropic => self.anthropic_api_key.as_deref(),
            ProviderKind::DeepSeek => self.deepseek_api_key.as_deref(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.encryption_key.len() != 64 || hex::decode(&self.encryption_key).is_err() {
            return Err(AppError::Config(
                "encryption_key must be exactly 64 hex characters (32 bytes)".to_string(),
            ));
        }
        if self.provider_api_key().is_none() {
            return Err(AppError::Config(format!(
                "no API key configured for provider '{}'",
                self.ai_provider.as_str()
            )));
        }
        if self.batch_size == 0 {
            return Err(AppError::Config("batch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn parses_minimal_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
db_path = "/tmp/newsdesk-test.db"
encryption_key = "{KEY}"
ai_provider = "anthropic"
anthropic_api_key = "sk-test"
"#
        )
        .unwrap();

        let config: Config = toml::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();

        assert_eq!(config.ai_provider, ProviderKind::Anthropic);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.feed_max_items, 20);
        assert_eq!(config.scrape_every_hours, 4);
        assert_eq!(config.x_api_base, "https://api.x.com");
        assert_eq!(config.provider_api_key(), Some("sk-test"));
        config.validate().unwrap();
    }

    #[test]
    fn rejects_short_encryption_key() {
        let config = Config {
            encryption_key: "abcd".to_string(),
            openai_api_key: Some("sk".to_string()),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn rejects_missing_provider_key() {
        let config = Config {
            encryption_key: KEY.to_string(),
            ai_provider: ProviderKind::DeepSeek,
            openai_api_key: Some("sk".to_string()),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("deepseek"));
    }
}
