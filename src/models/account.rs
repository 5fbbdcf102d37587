use chrono::{DateTime, Utc};

/// A connected X account. Token columns hold vault ciphertext, never plaintext.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub user_id: String,
    pub platform_user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub access_token_enc: String,
    pub refresh_token_enc: String,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: String,
    pub platform_user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub access_token_enc: String,
    pub refresh_token_enc: String,
    pub token_expires_at: Option<DateTime<Utc>>,
}

/// PKCE state persisted between the authorize redirect and the callback.
#[derive(Debug, Clone)]
pub struct OAuthState {
    pub id: String,
    pub user_id: String,
    pub code_verifier: String,
    pub expires_at: DateTime<Utc>,
}
