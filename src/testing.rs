//! Fixtures shared by unit tests across modules.

use crate::db::{Repository, Store};
use crate::models::{NewAccount, NewSource, Strategy};
use crate::services::{CredentialVault, XSettings};

pub(crate) const TEST_KEY: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

pub(crate) fn vault() -> CredentialVault {
    CredentialVault::from_hex(TEST_KEY).unwrap()
}

/// In-memory repository with one account and one feed source.
pub(crate) async fn seeded() -> (Repository, i64, i64) {
    let repo = Repository::open_in_memory().await.unwrap();
    let vault = vault();
    let account_id = repo
        .upsert_account(NewAccount {
            user_id: "user-1".to_string(),
            platform_user_id: "x-1".to_string(),
            username: "newsdesk".to_string(),
            display_name: None,
            access_token_enc: vault.encrypt("access-1").unwrap(),
            refresh_token_enc: vault.encrypt("refresh-1").unwrap(),
            token_expires_at: None,
        })
        .await
        .unwrap();
    let source_id = repo
        .insert_source(NewSource::new(
            account_id,
            "Example",
            "https://example.com",
            Strategy::Feed,
        ))
        .await
        .unwrap();
    (repo, account_id, source_id)
}

pub(crate) fn x_settings(api_base: &str) -> XSettings {
    XSettings {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        callback_url: "http://localhost/callback".to_string(),
        api_base: api_base.to_string(),
        authorize_url: "https://x.com/i/oauth2/authorize".to_string(),
        web_base: "https://x.com".to_string(),
    }
}
